use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::v2::InputPin;
use usb_device::bus::UsbBus;
use usb_device::device::UsbDevice;

use crate::connect::{BusControl, VbusMonitor};
use crate::serial_port::SerialPort;

struct Parts<B: UsbBus + 'static, const RX: usize, const TX: usize> {
    dev: UsbDevice<'static, B>,
    port: SerialPort<'static, B, RX, TX>,
}

/// Interrupt-safe handle to a [`UsbDevice`] and its [`SerialPort`].
///
/// The transmit staging state is shared between two execution contexts: the
/// USB interrupt handler (which runs the engine dispatcher and the endpoint
/// callbacks) and mainline code (whose [`send`](Self::send) kicks
/// transmission synchronously). Every access here runs inside one
/// `critical-section`, so the two contexts can never interleave on that
/// state.
///
/// `const`-constructible, so it can live in a `static` shared between the
/// interrupt handler and the main loop:
///
/// ```no_run
/// # use usb_device::class_prelude::*;
/// # use usbd_vcp::UsbSerialBridge;
/// # struct MyBus;
/// # impl UsbBus for MyBus {
/// #     fn alloc_ep(&mut self, _: usb_device::UsbDirection, _: Option<EndpointAddress>,
/// #         _: EndpointType, _: u16, _: u8) -> usb_device::Result<EndpointAddress> { unimplemented!() }
/// #     fn enable(&mut self) {}
/// #     fn reset(&self) {}
/// #     fn set_device_address(&self, _: u8) {}
/// #     fn write(&self, _: EndpointAddress, _: &[u8]) -> usb_device::Result<usize> { unimplemented!() }
/// #     fn read(&self, _: EndpointAddress, _: &mut [u8]) -> usb_device::Result<usize> { unimplemented!() }
/// #     fn set_stalled(&self, _: EndpointAddress, _: bool) {}
/// #     fn is_stalled(&self, _: EndpointAddress) -> bool { false }
/// #     fn suspend(&self) {}
/// #     fn resume(&self) {}
/// #     fn poll(&self) -> usb_device::bus::PollResult { usb_device::bus::PollResult::None }
/// # }
/// static USB: UsbSerialBridge<MyBus, 256, 1024> = UsbSerialBridge::new();
///
/// fn usb_interrupt() {
///     USB.poll();
/// }
///
/// fn main_loop() {
///     USB.send(b"hello");
/// }
/// ```
pub struct UsbSerialBridge<B: UsbBus + 'static, const RX: usize, const TX: usize> {
    inner: Mutex<RefCell<Option<Parts<B, RX, TX>>>>,
}

impl<B: UsbBus + 'static, const RX: usize, const TX: usize> UsbSerialBridge<B, RX, TX> {
    /// Creates an empty bridge. [`init`](Self::init) must run before any
    /// other operation does anything.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// One-time setup: takes ownership of the built device and port.
    pub fn init(&self, dev: UsbDevice<'static, B>, port: SerialPort<'static, B, RX, TX>) {
        critical_section::with(|cs| {
            self.inner.borrow_ref_mut(cs).replace(Parts { dev, port });
        });
    }

    /// Runs the engine dispatcher once. Call this from the USB interrupt
    /// handler (or the main loop when polling without interrupts). Returns
    /// whether any event was handled.
    pub fn poll(&self) -> bool {
        critical_section::with(|cs| match self.inner.borrow_ref_mut(cs).as_mut() {
            Some(parts) => parts.dev.poll(&mut [&mut parts.port]),
            None => false,
        })
    }

    /// Queues `data` for transmission and kicks the transmitter if a cable
    /// is present. Returns whether a connected session existed at call time;
    /// `false` before `init`.
    pub fn send(&self, data: &[u8]) -> bool {
        critical_section::with(|cs| match self.inner.borrow_ref_mut(cs).as_mut() {
            Some(parts) => parts.port.send(data),
            None => false,
        })
    }

    /// Copies received bytes into `buf`, returning the count. Non-blocking.
    pub fn receive(&self, buf: &mut [u8]) -> usize {
        critical_section::with(|cs| match self.inner.borrow_ref_mut(cs).as_mut() {
            Some(parts) => parts.port.receive(buf),
            None => 0,
        })
    }

    /// Polls the VBUS monitor and mirrors the result into the port, so
    /// subsequent [`send`](Self::send) calls know whether to kick
    /// transmission. Returns the current cable presence.
    pub fn check_connect<V: InputPin, C: BusControl>(
        &self,
        monitor: &mut VbusMonitor<V>,
        bus: &mut C,
    ) -> core::result::Result<bool, V::Error> {
        let connected = monitor.poll(bus)?;
        self.set_connected(connected);
        Ok(connected)
    }

    /// Overrides the port's cable presence directly, for targets that learn
    /// about VBUS by other means than a polled pin.
    pub fn set_connected(&self, connected: bool) {
        critical_section::with(|cs| {
            if let Some(parts) = self.inner.borrow_ref_mut(cs).as_mut() {
                parts.port.set_connected(connected);
            }
        });
    }

    /// Cable presence as last recorded; `false` before `init`.
    pub fn is_connected(&self) -> bool {
        critical_section::with(|cs| {
            self.inner
                .borrow_ref(cs)
                .as_ref()
                .map_or(false, |parts| parts.port.is_connected())
        })
    }

    /// Runs `f` with the device and port inside the critical section, for
    /// anything the fixed API does not cover. Returns `None` before `init`.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut UsbDevice<'static, B>, &mut SerialPort<'static, B, RX, TX>) -> R,
    ) -> Option<R> {
        critical_section::with(|cs| {
            self.inner
                .borrow_ref_mut(cs)
                .as_mut()
                .map(|parts| f(&mut parts.dev, &mut parts.port))
        })
    }
}
