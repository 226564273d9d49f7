//! Outbound fan-out.
//!
//! Each fan-out picks one message out of the candidates, publishes the
//! matching lifecycle event and hands the message to every adapter. An
//! adapter failing does not stop delivery to the others.

use courier_core::{BoxedAdapter, Envelope, EventName, LifecycleEvent};
use rand::seq::SliceRandom;
use tracing::{debug, error};

use crate::error::FanOutError;
use crate::robot::{ICON_ROUTE, Robot};

/// Picks one message: the only one, a uniformly random one, or `""` when
/// there is none.
pub fn choose_random_message(messages: &[String]) -> String {
    match messages {
        [] => String::new(),
        [only] => only.clone(),
        _ => messages
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default(),
    }
}

/// Returns the icon URL served by `host`, always over plain `http`.
pub fn default_icon_url(host: &str) -> String {
    let host = match host.strip_prefix("https") {
        Some(rest) => format!("http{rest}"),
        None => host.to_string(),
    };
    format!("{host}{ICON_ROUTE}")
}

#[derive(Clone, Copy)]
enum Route {
    Send,
    Reply,
    Direct,
}

impl Route {
    fn event(self) -> EventName {
        match self {
            Route::Send => EventName::Send,
            Route::Reply | Route::Direct => EventName::Respond,
        }
    }
}

impl Robot {
    /// Sends one of `messages` to the envelope's channel on every adapter.
    pub async fn send_messages(&self, envelope: &Envelope, messages: &[String]) {
        self.fan_out(envelope, messages, Route::Send).await;
    }

    /// Replies one of `messages` to the envelope's user on every adapter.
    ///
    /// Fails before reaching any adapter when there is something to reply
    /// but the envelope names no user.
    pub async fn respond_messages(
        &self,
        envelope: &Envelope,
        messages: &[String],
    ) -> Result<(), FanOutError> {
        if !messages.is_empty() && envelope.user.name.is_empty() {
            return Err(FanOutError::MissingUserName);
        }
        self.fan_out(envelope, messages, Route::Reply).await;
        Ok(())
    }

    /// Sends one of `messages` privately to the envelope's user. Adapters
    /// without direct messaging reply instead.
    pub async fn send_direct_messages(&self, envelope: &Envelope, messages: &[String]) {
        self.fan_out(envelope, messages, Route::Direct).await;
    }

    async fn fan_out(&self, envelope: &Envelope, messages: &[String], route: Route) {
        if messages.is_empty() {
            return;
        }
        let message = choose_random_message(messages);
        let mut envelope = envelope.clone();
        if envelope.icon_url.is_empty()
            && let Some(host) = self.host()
        {
            envelope.icon_url = default_icon_url(host);
        }

        self.emit(LifecycleEvent::with_message(
            route.event(),
            envelope.clone(),
            message.clone(),
        ))
        .await;

        for adapter in self.adapters() {
            debug!(
                adapter = %adapter.name(),
                candidates = messages.len(),
                "Chose a message and delivering it"
            );
            if let Err(e) = deliver(&adapter, route, &envelope, &message).await {
                error!(adapter = %adapter.name(), error = %e, "Failed to deliver message");
            }
        }
    }
}

async fn deliver(
    adapter: &BoxedAdapter,
    route: Route,
    envelope: &Envelope,
    message: &str,
) -> courier_core::AdapterResult<()> {
    match route {
        Route::Send => adapter.send(envelope, message).await,
        Route::Reply => adapter.reply(envelope, message).await,
        Route::Direct => match adapter.as_direct() {
            Some(direct) => direct.send_direct(envelope, message).await,
            None => adapter.reply(envelope, message).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use courier_core::UserIdentity;

    use super::*;
    use crate::testing::RecordingAdapter;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_choose_random_message() {
        assert_eq!(choose_random_message(&[]), "");
        assert_eq!(choose_random_message(&strings(&["only"])), "only");

        let pair = strings(&["a", "b"]);
        let seen: HashSet<String> = (0..1000).map(|_| choose_random_message(&pair)).collect();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_default_icon_url_downgrades_https() {
        assert_eq!(
            default_icon_url("https://bot.example.com"),
            "http://bot.example.com/static/courier_icon.png"
        );
        assert_eq!(
            default_icon_url("http://localhost:8080"),
            "http://localhost:8080/static/courier_icon.png"
        );
    }

    #[tokio::test]
    async fn test_empty_candidates_do_nothing() {
        let robot = Arc::new(Robot::new("bot"));
        let adapter = Arc::new(RecordingAdapter::new("recording"));
        robot.register_adapter(adapter.clone());
        let _sub = robot.on_any();

        robot.send_messages(&Envelope::new("x"), &[]).await;
        tokio_test::assert_ok!(robot.respond_messages(&Envelope::new("x"), &[]).await);
        assert!(adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_respond_requires_user_name() {
        let robot = Robot::new("bot");
        let adapter = Arc::new(RecordingAdapter::new("recording"));
        robot.register_adapter(adapter.clone());

        let err = tokio_test::assert_err!(
            robot
                .respond_messages(&Envelope::new("x"), &strings(&["hi"]))
                .await
        );
        assert_eq!(err, FanOutError::MissingUserName);
        assert!(adapter.sent().is_empty());

        let envelope = Envelope::new("x").with_user(UserIdentity::named("ann"));
        tokio_test::assert_ok!(robot.respond_messages(&envelope, &strings(&["hi"])).await);
        assert_eq!(adapter.sent(), [("reply".to_string(), "hi".to_string())]);
    }

    #[tokio::test]
    async fn test_direct_falls_back_to_reply() {
        let robot = Robot::new("bot");
        let plain = Arc::new(RecordingAdapter::new("plain"));
        let direct = Arc::new(RecordingAdapter::new("direct").with_direct());
        robot.register_adapter(plain.clone());
        robot.register_adapter(direct.clone());

        robot
            .send_direct_messages(&Envelope::new("x"), &strings(&["psst"]))
            .await;

        assert_eq!(plain.sent(), [("reply".to_string(), "psst".to_string())]);
        assert_eq!(direct.sent(), [("direct".to_string(), "psst".to_string())]);
    }

    #[tokio::test]
    async fn test_failing_adapter_does_not_stop_others() {
        let robot = Robot::new("bot");
        let broken = Arc::new(RecordingAdapter::new("broken").failing());
        let healthy = Arc::new(RecordingAdapter::new("healthy"));
        robot.register_adapter(broken);
        robot.register_adapter(healthy.clone());

        robot.send_messages(&Envelope::new("x"), &strings(&["hi"])).await;
        assert_eq!(healthy.sent(), [("send".to_string(), "hi".to_string())]);
    }

    #[tokio::test]
    async fn test_event_carries_message_and_icon() {
        let robot = Arc::new(Robot::new("bot").with_host("https://bot.example.com"));
        let adapter = Arc::new(RecordingAdapter::new("recording"));
        robot.register_adapter(adapter.clone());
        let mut sub = robot.on(EventName::Send);

        let task = {
            let robot = robot.clone();
            tokio::spawn(async move {
                robot.send_messages(&Envelope::new("x"), &strings(&["hi"])).await;
            })
        };

        let event = sub.recv().await.unwrap().into_event();
        task.await.unwrap();
        assert_eq!(event.message.as_deref(), Some("hi"));
        assert_eq!(
            event.envelope.icon_url,
            "http://bot.example.com/static/courier_icon.png"
        );
        assert_eq!(adapter.envelopes()[0].icon_url, event.envelope.icon_url);
    }
}
