//! # Courier Shell Adapter
//!
//! Drives a Courier robot from a terminal. Lines typed on stdin are fed to
//! the kernel; outbound messages are printed with a `Send> `, `Reply> ` or
//! `Direct> ` prefix.
//!
//! ```rust,ignore
//! use courier_adapter_shell::ShellAdapter;
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::new()?;
//! runtime.register_adapter::<ShellAdapter>()?;
//! runtime.run().await?;
//! ```
//!
//! Slash commands are typed as `/trigger arguments`; the command token is the
//! trigger itself.

pub mod adapter;
pub mod config;

pub use adapter::{ADAPTER_NAME, ShellAdapter};
pub use config::ShellConfig;
