//! Irrigation event channels
//!
//! The irrigation backend moves two kinds of traffic through the hub:
//! - sensor readings, which late-joining dashboards replay (bounded by the
//!   hub's history size and age defaults)
//! - valve commands, which are delivered best-effort to whoever is listening
//!   right now and are never replayed

use std::sync::Arc;

use bytes::Bytes;

use crate::hub::{BroadcastHub, HubError, TopicConfig};
use crate::subscriber::Subscription;

/// Topic carrying device state reports
pub const SENSOR_READINGS_TOPIC: &str = "sensor-readings";

/// Topic carrying valve commands
pub const COMMANDS_TOPIC: &str = "commands";

/// The two pre-declared irrigation topics on a shared hub
#[derive(Clone)]
pub struct IrrigationChannels {
    hub: Arc<BroadcastHub>,
}

impl IrrigationChannels {
    /// Declare both topics on `hub`
    ///
    /// Sensor readings use the hub's replay defaults; commands are live-only.
    pub async fn declare(hub: Arc<BroadcastHub>) -> Result<Self, HubError> {
        let readings = hub.config().topic_defaults.clone();
        hub.get_or_create_topic(SENSOR_READINGS_TOPIC, Some(readings))
            .await?;
        hub.get_or_create_topic(COMMANDS_TOPIC, Some(TopicConfig::live_only()))
            .await?;

        tracing::info!(
            readings = SENSOR_READINGS_TOPIC,
            commands = COMMANDS_TOPIC,
            "Irrigation channels declared"
        );

        Ok(Self { hub })
    }

    /// Get the underlying hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Publish a sensor reading
    pub async fn publish_reading(&self, reading: impl Into<Bytes>) -> Result<u64, HubError> {
        self.hub.publish(SENSOR_READINGS_TOPIC, reading).await
    }

    /// Subscribe to sensor readings, starting with the retained history
    pub async fn subscribe_readings(&self) -> Result<Subscription, HubError> {
        self.hub.subscribe(SENSOR_READINGS_TOPIC).await
    }

    /// Publish a valve command
    pub async fn publish_command(&self, command: impl Into<Bytes>) -> Result<u64, HubError> {
        self.hub.publish(COMMANDS_TOPIC, command).await
    }

    /// Subscribe to valve commands published from now on
    pub async fn subscribe_commands(&self) -> Result<Subscription, HubError> {
        self.hub.subscribe(COMMANDS_TOPIC).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{DeliveryPolicy, HubConfig};

    #[tokio::test]
    async fn test_declare_creates_both_topics() {
        let hub = Arc::new(BroadcastHub::new());
        let channels = IrrigationChannels::declare(Arc::clone(&hub)).await.unwrap();

        assert_eq!(
            channels.hub().topic_names().await,
            vec![COMMANDS_TOPIC, SENSOR_READINGS_TOPIC]
        );

        let commands = hub.topic(COMMANDS_TOPIC).await.unwrap();
        assert_eq!(commands.config().delivery, DeliveryPolicy::LiveOnly);

        let readings = hub.topic(SENSOR_READINGS_TOPIC).await.unwrap();
        assert_eq!(readings.config().history_size, 500);
        assert!(readings.is_pinned());
    }

    #[tokio::test]
    async fn test_readings_replay_to_late_dashboard() {
        let hub = Arc::new(BroadcastHub::with_config(HubConfig::default().history_size(2)));
        let channels = IrrigationChannels::declare(hub).await.unwrap();

        for moisture in [40, 41, 42] {
            let reading = format!(r#"{{"type":"state","deviceId":"d1","moists":[{}]}}"#, moisture);
            channels.publish_reading(reading).await.unwrap();
        }

        let mut dashboard = channels.subscribe_readings().await.unwrap();
        assert_eq!(dashboard.pending_replay(), 2);
        let first = dashboard.recv().await.unwrap();
        assert!(first.payload_str().unwrap().contains("[41]"));
    }

    #[tokio::test]
    async fn test_commands_are_not_replayed() {
        let hub = Arc::new(BroadcastHub::new());
        let channels = IrrigationChannels::declare(hub).await.unwrap();

        channels
            .publish_command(r#"{"deviceId":"d1","command":"OPEN_VALVE","valve":1}"#)
            .await
            .unwrap();

        let mut device = channels.subscribe_commands().await.unwrap();
        assert_eq!(device.try_recv(), Ok(None));

        channels
            .publish_command(r#"{"deviceId":"d1","command":"CLOSE_VALVE","valve":1}"#)
            .await
            .unwrap();
        let command = device.recv().await.unwrap();
        assert!(command.payload_str().unwrap().contains("CLOSE_VALVE"));
    }
}
