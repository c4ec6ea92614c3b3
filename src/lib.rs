//! Serial protocol driver for RoboMaster gimbal controllers.
//!
//! The controller streams fixed-size [`ReceivePacket`](packets::ReceivePacket) frames carrying
//! the gimbal attitude and accepts [`SendPacket`](packets::SendPacket) aiming commands. Both
//! directions are packed little-endian structures terminated by a [CRC16](crc).
//!
//! A [`LinkSession`](session::LinkSession) owns the port, decodes incoming frames on a
//! background task and writes outgoing commands. When the port drops, the session keeps
//! reopening it until it comes back.

pub mod config;
pub mod connection;
pub mod crc;
pub mod decode;
pub mod encode;
pub mod packets;
pub mod session;
pub mod telemetry;

pub use session::{LinkError, LinkSession, LinkState};
