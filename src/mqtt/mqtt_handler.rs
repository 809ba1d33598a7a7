use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tracing::{debug, info, warn};

use super::config::BrokerSettings;
use super::message_manager::OutboundMessage;
use super::TransportError;

const REQUEST_CAPACITY: usize = 10;
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Published,
    Failed,
}

#[derive(Clone, Debug, Default)]
pub struct MqttStatus {
    pub connection_state: ConnectionState,
    pub messages_sent: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

impl MqttStatus {
    fn transition(&mut self, state: ConnectionState) {
        debug!("MQTT state {:?} -> {:?}", self.connection_state, state);
        self.connection_state = state;
        self.last_activity = Some(chrono::Local::now());
    }
}

/// Drives a single connect, publish, disconnect cycle.
pub struct MqttHandler {
    status: MqttStatus,
    client: AsyncClient,
    eventloop: EventLoop,
    settings: BrokerSettings,
}

impl MqttHandler {
    pub async fn new(settings: BrokerSettings) -> Result<Self, TransportError> {
        let options = settings.mqtt_options().await?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        Ok(MqttHandler {
            status: MqttStatus::default(),
            client,
            eventloop,
            settings,
        })
    }

    pub fn status(&self) -> &MqttStatus {
        &self.status
    }

    /// Publishes `message` once and disconnects. Never retries.
    pub async fn publish_once(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        match tokio::time::timeout(PUBLISH_TIMEOUT, self.run(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.status.transition(ConnectionState::Failed);
                Err(e)
            }
            Err(_) => {
                self.status.transition(ConnectionState::Failed);
                Err(TransportError::Timeout(PUBLISH_TIMEOUT))
            }
        }
    }

    async fn run(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.status.transition(ConnectionState::Connecting);
        info!(
            "Connecting to {}:{} as {}",
            self.settings.host, self.settings.port, self.settings.client_id
        );

        self.client
            .publish(
                message.topic(),
                self.settings.qos,
                self.settings.retain,
                message.content().as_bytes().to_vec(),
            )
            .await?;

        loop {
            let event = self.eventloop.poll().await?;

            if matches!(event, Event::Incoming(Packet::ConnAck(_))) {
                self.status.transition(ConnectionState::Connected);
            }

            if completes_publish(self.settings.qos, &event) {
                self.status.messages_sent += 1;
                self.status.transition(ConnectionState::Published);
                debug!("Message published to topic {}: {}", message.topic(), message.content());
                self.client.disconnect().await?;
            }

            if let Event::Outgoing(Outgoing::Disconnect) = event {
                self.status.transition(ConnectionState::Disconnected);
                return Ok(());
            }

            if let Event::Incoming(Packet::Disconnect) = event {
                warn!("Broker closed the connection before the publish completed");
                return Err(TransportError::ClosedByBroker);
            }
        }
    }
}

/// Whether `event` finishes the publish for the given QoS.
fn completes_publish(qos: QoS, event: &Event) -> bool {
    match (qos, event) {
        (QoS::AtMostOnce, Event::Outgoing(Outgoing::Publish(_))) => true,
        (QoS::AtLeastOnce, Event::Incoming(Packet::PubAck(_))) => true,
        (QoS::ExactlyOnce, Event::Incoming(Packet::PubComp(_))) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{PubAck, PubComp};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
    const DISCONNECT: u8 = 0xE0;

    fn settings(port: u16, qos: QoS) -> BrokerSettings {
        BrokerSettings {
            host: "127.0.0.1".to_string(),
            port,
            client_id: "meross-toggle-test".to_string(),
            keep_alive: Duration::from_secs(5),
            credentials: None,
            tls: None,
            protocol: Default::default(),
            qos,
            retain: false,
        }
    }

    /// Reads one MQTT packet: first header byte and body. `None` at end of stream.
    async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
        let header = stream.read_u8().await.ok()?;

        let mut remaining = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.ok()?;
            remaining |= ((byte & 0x7F) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        let mut body = vec![0u8; remaining];
        stream.read_exact(&mut body).await.ok()?;
        Some((header, body))
    }

    /// Accepts one client, acknowledges CONNECT (and QoS 1 PUBLISH unless
    /// `hang_up` is set, in which case it answers the publish with DISCONNECT).
    /// Returns every packet received until the client disconnects.
    async fn fake_broker(hang_up: bool) -> (u16, JoinHandle<Vec<(u8, Vec<u8>)>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let broker = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut packets = Vec::new();

            while let Some((header, body)) = read_packet(&mut stream).await {
                match header >> 4 {
                    1 => stream.write_all(&CONNACK).await.unwrap(),
                    3 if hang_up => stream.write_all(&[DISCONNECT, 0x00]).await.unwrap(),
                    3 if (header >> 1) & 0x03 == 1 => {
                        let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                        let pkid = [body[2 + topic_len], body[3 + topic_len]];
                        stream
                            .write_all(&[0x40, 0x02, pkid[0], pkid[1]])
                            .await
                            .unwrap();
                    }
                    _ => {}
                }

                let done = header == DISCONNECT;
                packets.push((header, body));
                if done {
                    break;
                }
            }
            packets
        });

        (port, broker)
    }

    fn payload(content: &str) -> OutboundMessage {
        OutboundMessage::from_topic("/appliance/abc123/subscribe".into(), content.into())
    }

    async fn publish_through_fake_broker(qos: QoS) {
        let (port, broker) = fake_broker(false).await;
        let content = r#"{"header":{"method":"SET"},"payload":{"channel":0,"toggle":{"onoff":1}}}"#;

        let mut handler = MqttHandler::new(settings(port, qos)).await.unwrap();
        let result = handler.publish_once(&payload(content)).await;

        assert!(result.is_ok(), "publish failed: {:?}", result);
        assert_eq!(handler.status().connection_state, ConnectionState::Disconnected);
        assert_eq!(handler.status().messages_sent, 1);

        drop(handler);
        let packets = broker.await.unwrap();

        let publish = packets
            .iter()
            .find(|(header, _)| header >> 4 == 3)
            .expect("broker saw no PUBLISH");
        assert!(publish.1.ends_with(content.as_bytes()));

        let (last_header, last_body) = packets.last().unwrap();
        assert_eq!(*last_header, DISCONNECT);
        assert!(last_body.is_empty());
    }

    #[tokio::test]
    async fn qos0_publish_reaches_broker_and_disconnects() {
        publish_through_fake_broker(QoS::AtMostOnce).await;
    }

    #[tokio::test]
    async fn qos1_publish_waits_for_puback_then_disconnects() {
        publish_through_fake_broker(QoS::AtLeastOnce).await;
    }

    #[tokio::test]
    async fn broker_hang_up_before_ack_is_an_error() {
        let (port, _broker) = fake_broker(true).await;

        let mut handler = MqttHandler::new(settings(port, QoS::AtLeastOnce))
            .await
            .unwrap();
        let result = handler.publish_once(&payload("{}")).await;

        assert!(result.is_err());
        assert_eq!(handler.status().connection_state, ConnectionState::Failed);
        assert_eq!(handler.status().messages_sent, 0);
    }

    #[test]
    fn qos0_completes_once_sent() {
        let sent = Event::Outgoing(Outgoing::Publish(0));
        assert!(completes_publish(QoS::AtMostOnce, &sent));
        assert!(!completes_publish(QoS::AtLeastOnce, &sent));
    }

    #[test]
    fn qos1_waits_for_puback() {
        let ack = Event::Incoming(Packet::PubAck(PubAck::new(1)));
        assert!(completes_publish(QoS::AtLeastOnce, &ack));
        assert!(!completes_publish(QoS::ExactlyOnce, &ack));
    }

    #[test]
    fn qos2_waits_for_pubcomp() {
        let comp = Event::Incoming(Packet::PubComp(PubComp::new(1)));
        assert!(completes_publish(QoS::ExactlyOnce, &comp));
        assert!(!completes_publish(QoS::AtMostOnce, &comp));
    }

    #[test]
    fn status_transition_records_activity() {
        let mut status = MqttStatus::default();
        assert_eq!(status.connection_state, ConnectionState::Disconnected);
        status.transition(ConnectionState::Connecting);
        assert_eq!(status.connection_state, ConnectionState::Connecting);
        assert!(status.last_activity.is_some());
    }

    #[tokio::test]
    async fn unreachable_broker_fails_without_retry() {
        let mut handler = MqttHandler::new(settings(1, QoS::AtMostOnce)).await.unwrap();

        assert!(handler.publish_once(&payload("{}")).await.is_err());
        assert_eq!(handler.status().connection_state, ConnectionState::Failed);
        assert_eq!(handler.status().messages_sent, 0);
    }
}
