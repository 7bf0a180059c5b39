//! Buffered CDC-ACM USB virtual serial port for [usb-device](https://crates.io/crates/usb-device).
//!
//! CDC-ACM is a USB class that's supported out of the box by most operating systems and used for
//! implementing modems and generic serial ports. The [`SerialPort`] class implements a buffered
//! byte-stream port on top of it: host-to-device packets are drained into a receive queue from
//! interrupt context, and queued device-to-host bytes are packetized with correct short/zero-length
//! packet framing, so application code can call [`SerialPort::send`] and [`SerialPort::receive`]
//! at its own pace without worrying about USB packet boundaries.
//!
//! The crate also contains [`CdcAcmClass`], a lower-level implementation that has less overhead
//! but requires more care to use correctly, [`VbusMonitor`] for edge-triggered cable
//! connect/disconnect handling, and [`UsbSerialBridge`] for sharing the port between the USB
//! interrupt handler and mainline code.
//!
//! Example
//! =======
//!
//! A full example requires the use of a hardware driver, but the hardware independent part is as
//! follows:
//!
//! ```no_run
//! # use usb_device::class_prelude::*;
//! # fn dummy<B: UsbBus>(usb_bus: UsbBusAllocator<B>) {
//! use usb_device::prelude::*;
//! use usbd_vcp::{SerialPort, USB_CLASS_CDC};
//!
//! let mut serial: SerialPort<_> = SerialPort::new(&usb_bus);
//!
//! let mut usb_dev = UsbDeviceBuilder::new(&usb_bus, UsbVidPid(0x0483, 0x5740))
//!     .manufacturer("Fake company")
//!     .product("Serial port")
//!     .serial_number("TEST")
//!     .device_class(USB_CLASS_CDC)
//!     .build();
//!
//! serial.set_connected(true);
//!
//! let mut buf = [0u8; 64];
//!
//! loop {
//!     if !usb_dev.poll(&mut [&mut serial]) {
//!         continue;
//!     }
//!
//!     // Echo every received byte back to the host.
//!     let count = serial.receive(&mut buf);
//!     serial.send(&buf[..count]);
//! }
//! # }
//! ```

#![no_std]

mod bridge;
mod buffer;
mod cdc_acm;
mod connect;
mod io;
mod serial_port;

pub use crate::bridge::UsbSerialBridge;
pub use crate::buffer::RingBuffer;
pub use crate::cdc_acm::{CdcAcmClass, LineCoding, ParityType, StopBits, USB_CLASS_CDC};
pub use crate::connect::{BusControl, SoftConnect, VbusMonitor};
pub use crate::serial_port::SerialPort;
pub use usb_device::{Result, UsbError};
