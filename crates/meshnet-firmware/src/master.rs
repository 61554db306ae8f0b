//! Master firmware: a bridge between the mesh and the host serial link.
//!
//! Authenticated mesh packets go up to the host as serial frames; frames
//! from the host go down to the addressed node unchanged. The host owns the
//! master side of every session.

use crate::config::MasterConfig;
use meshnet_common::{MeshTransport, SerialPort};
use meshnet_metrics::metric_defs;
use meshnet_metrics::MetricLabels;
use meshnet_packet::{verify_wire, MessageType, NodeAddr};
use meshnet_serial_protocol::{encode_frame, SerialFramer, MAX_FRAME_PAYLOAD};
use std::fmt;

/// Bytes read from the serial port per read call.
const SERIAL_CHUNK: usize = 64;

/// The master's runtime state.
pub struct MasterFirmware<T, S> {
    config: MasterConfig,
    labels: MetricLabels,
    transport: T,
    serial: S,
    framer: SerialFramer,
    rx_buf: [u8; MAX_FRAME_PAYLOAD],
}

impl<T: MeshTransport, S: SerialPort> MasterFirmware<T, S> {
    /// Create a master bridging `transport` and `serial`.
    pub fn new(config: MasterConfig, transport: T, serial: S) -> Self {
        MasterFirmware {
            labels: MetricLabels::master(config.name.clone()),
            config,
            transport,
            serial,
            framer: SerialFramer::new(),
            rx_buf: [0u8; MAX_FRAME_PAYLOAD],
        }
    }

    /// Master name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Mesh address.
    pub fn address(&self) -> NodeAddr {
        self.transport.address()
    }

    /// Host-side frame decoder, for its counters.
    pub fn framer(&self) -> &SerialFramer {
        &self.framer
    }

    /// Run one bridging step in each direction.
    pub fn process(&mut self) {
        self.transport.update();
        self.uplink();
        self.downlink();
    }

    /// Forward at most one mesh packet to the host.
    fn uplink(&mut self) {
        if !self.transport.available() {
            return;
        }
        let Some(header) = self.transport.receive(&mut self.rx_buf) else {
            return;
        };
        let data = &self.rx_buf[..header.len];

        if self.config.verify_uplink {
            let to = self.transport.address();
            let verified = verify_wire(&self.config.key, header.from, to, header.msg_type, data);
            if let Err(err) = verified {
                log::debug!(
                    "[{}] withholding type {} from {}: {}",
                    self.config.name,
                    header.msg_type,
                    header.from,
                    err
                );
                metrics::counter!(
                    metric_defs::MASTER_UPLINK_REJECTED.name,
                    &self.labels.with(&[("reason", err.reason().to_string())])
                )
                .increment(1);
                return;
            }
        }

        let frame = match encode_frame(header.from, header.msg_type, data) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!(
                    "[{}] cannot frame packet from {}: {}",
                    self.config.name,
                    header.from,
                    err
                );
                metrics::counter!(
                    metric_defs::MASTER_UPLINK_REJECTED.name,
                    &self.labels.with(&[("reason", err.reason().to_string())])
                )
                .increment(1);
                return;
            }
        };

        let type_label = MessageType::try_from(header.msg_type)
            .map(|t| t.as_str())
            .unwrap_or("unknown");
        log::trace!(
            "[{}] uplink {} from {}: {}",
            self.config.name,
            type_label,
            header.from,
            hex::encode(&frame)
        );
        self.serial.write(&frame);
        metrics::counter!(
            metric_defs::MASTER_UPLINK_FORWARDED.name,
            &self.labels.with(&[("msg_type", type_label.to_string())])
        )
        .increment(1);
        metrics::counter!(metric_defs::MASTER_SERIAL_TX_BYTES.name, &self.labels.to_labels())
            .increment(frame.len() as u64);
    }

    /// Drain the serial port and send every complete frame to the mesh.
    fn downlink(&mut self) {
        let mut chunk = [0u8; SERIAL_CHUNK];
        loop {
            let n = self.serial.read(&mut chunk);
            if n == 0 {
                break;
            }
            self.framer.push(&chunk[..n]);
        }

        let dropped_before = self.framer.frames_dropped();
        while let Some(frame) = self.framer.decode() {
            metrics::counter!(metric_defs::SERIAL_FRAMES_DECODED.name, &self.labels.to_labels())
                .increment(1);
            if self.transport.send(frame.node, frame.msg_type, &frame.payload) {
                log::trace!(
                    "[{}] downlink type {} to {} ({} bytes)",
                    self.config.name,
                    frame.msg_type,
                    frame.node,
                    frame.payload.len()
                );
            } else {
                log::warn!(
                    "[{}] mesh refused type {} for {}",
                    self.config.name,
                    frame.msg_type,
                    frame.node
                );
                metrics::counter!(
                    metric_defs::MASTER_DOWNLINK_FAILED.name,
                    &self.labels.to_labels()
                )
                .increment(1);
            }
        }

        let dropped = self.framer.frames_dropped() - dropped_before;
        if dropped > 0 {
            metrics::counter!(metric_defs::SERIAL_FRAMES_DROPPED.name, &self.labels.to_labels())
                .increment(dropped);
        }
    }
}

impl<T, S> fmt::Debug for MasterFirmware<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterFirmware")
            .field("name", &self.config.name)
            .field("verify_uplink", &self.config.verify_uplink)
            .field("framer", &self.framer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshnet_common::sim::{SimMesh, SimPacket, SimSerial};
    use meshnet_packet::{AuthKey, Envelope, MASTER_ADDR};

    #[test]
    fn test_uplink_verified_packet() {
        let mesh = SimMesh::new();
        mesh.endpoint(3);
        let (port, mut host) = SimSerial::pair();
        let key = AuthKey::default();
        let mut master =
            MasterFirmware::new(MasterConfig::new(key), mesh.endpoint(MASTER_ADDR), port);

        let mut env = Envelope::new();
        env.init(9, 1);
        env.set_short(12).unwrap();
        let len = env.finalize(&key, 3, MASTER_ADDR, MessageType::Pong);
        let wire = env.as_bytes()[..len].to_vec();
        mesh.inject(SimPacket::new(3, MASTER_ADDR, MessageType::Pong.as_u8(), wire.clone()));

        master.process();
        let expected = encode_frame(3, MessageType::Pong.as_u8(), &wire).unwrap();
        assert_eq!(host.read_all(), expected);
    }

    #[test]
    fn test_uplink_drops_unverified_packet() {
        let mesh = SimMesh::new();
        let (port, mut host) = SimSerial::pair();
        let mut master =
            MasterFirmware::new(MasterConfig::default(), mesh.endpoint(MASTER_ADDR), port);

        mesh.inject(SimPacket::new(3, MASTER_ADDR, 77, vec![0u8; 15]));
        master.process();
        assert!(host.read_all().is_empty());
        assert_eq!(mesh.pending(MASTER_ADDR), 0);
    }

    #[test]
    fn test_uplink_without_verification() {
        let mesh = SimMesh::new();
        let (port, mut host) = SimSerial::pair();
        let mut config = MasterConfig::default();
        config.verify_uplink = false;
        let mut master = MasterFirmware::new(config, mesh.endpoint(MASTER_ADDR), port);

        mesh.inject(SimPacket::new(3, MASTER_ADDR, 200, vec![1, 2]));
        master.process();
        assert_eq!(host.read_all(), encode_frame(3, 200, &[1, 2]).unwrap());
    }

    #[test]
    fn test_downlink_forwards_frames() {
        let mesh = SimMesh::new();
        mesh.endpoint(4);
        let (port, mut host) = SimSerial::pair();
        let mut master =
            MasterFirmware::new(MasterConfig::default(), mesh.endpoint(MASTER_ADDR), port);

        let mut bytes = vec![0x00, 0xAF, 0x13];
        bytes.extend(encode_frame(4, 73, &[0, 0xFF]).unwrap());
        host.write(&bytes);
        master.process();

        let packet = mesh.pop(4).unwrap();
        assert_eq!(packet, SimPacket::new(MASTER_ADDR, 4, 73, vec![0, 0xFF]));
        assert_eq!(master.framer().frames_decoded(), 1);
    }

    #[test]
    fn test_downlink_send_failure() {
        let mesh = SimMesh::with_log();
        let (port, mut host) = SimSerial::pair();
        let mut master =
            MasterFirmware::new(MasterConfig::default(), mesh.endpoint(MASTER_ADDR), port);

        // No endpoint at 9.
        host.write(&encode_frame(9, 76, &[]).unwrap());
        master.process();
        assert_eq!(master.framer().frames_decoded(), 1);
        assert!(mesh.take_delivered().is_empty());
    }

}
