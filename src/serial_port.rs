use crate::buffer::RingBuffer;
use crate::cdc_acm::*;
use usb_device::class_prelude::*;
use usb_device::Result;

/// Max packet size of the bulk data endpoints, and therefore the size of the
/// transmit staging buffer.
const PACKET_SIZE: usize = 64;

/// One USB packet being accumulated from the transmit queue.
///
/// `zlp_pending` records that the last packet handed to the endpoint was
/// full-size, so the transfer still needs a terminating short packet. A short
/// or zero-length packet clears it, since either one already ends the
/// transfer from the host's point of view.
struct TxStage {
    buf: [u8; PACKET_SIZE],
    len: usize,
    zlp_pending: bool,
}

impl TxStage {
    const fn new() -> Self {
        Self {
            buf: [0; PACKET_SIZE],
            len: 0,
            zlp_pending: false,
        }
    }
}

/// USB serial port (CDC-ACM) class with built-in ring buffering.
///
/// Host-to-device packets are drained into a receive queue as they arrive, so
/// application code can consume the byte stream at its own pace with
/// [`receive`](Self::receive). Device-to-host bytes queued with
/// [`send`](Self::send) are packetized on endpoint completion, with a
/// zero-length packet appended whenever a transfer ends on a full-size packet
/// so the host's bulk framing sees the end of the transfer.
///
/// `RX` and `TX` are the receive and transmit queue capacities in bytes.
pub struct SerialPort<'a, B: UsbBus, const RX: usize = 256, const TX: usize = 1024> {
    inner: CdcAcmClass<'a, B>,
    pub(crate) rx_buf: RingBuffer<RX>,
    pub(crate) tx_buf: RingBuffer<TX>,
    stage: TxStage,
    connected: bool,
}

impl<'a, B: UsbBus, const RX: usize, const TX: usize> SerialPort<'a, B, RX, TX> {
    /// Creates a new USB serial port with the provided UsbBus.
    pub fn new(alloc: &'a UsbBusAllocator<B>) -> SerialPort<'a, B, RX, TX> {
        SerialPort {
            inner: CdcAcmClass::new(alloc, PACKET_SIZE as u16),
            rx_buf: RingBuffer::new(),
            tx_buf: RingBuffer::new(),
            stage: TxStage::new(),
            connected: false,
        }
    }

    /// Gets the current line coding.
    pub fn line_coding(&self) -> &LineCoding {
        self.inner.line_coding()
    }

    /// Gets the DTR (data terminal ready) state.
    pub fn dtr(&self) -> bool {
        self.inner.dtr()
    }

    /// Gets the RTS (request to send) state.
    pub fn rts(&self) -> bool {
        self.inner.rts()
    }

    /// Records whether a cable is physically present, as reported by the VBUS
    /// lifecycle (see [`VbusMonitor`](crate::VbusMonitor)). While
    /// disconnected, [`send`](Self::send) only queues.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Whether a cable was present at the last lifecycle poll.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Queues every byte of `data` for transmission, then, if connected,
    /// kicks transmission immediately instead of waiting for the next
    /// endpoint completion.
    ///
    /// Returns whether a connected session existed at call time. The bytes
    /// are queued either way, subject to the transmit queue's
    /// overwrite-oldest overflow policy (see
    /// [`tx_overruns`](Self::tx_overruns)).
    pub fn send(&mut self, data: &[u8]) -> bool {
        for &byte in data {
            self.tx_buf.push(byte);
        }

        if self.connected {
            self.flush().ok();
            true
        } else {
            false
        }
    }

    /// Copies up to `buf.len()` received bytes out of the receive queue and
    /// returns the number copied. Non-blocking; returns 0 when nothing has
    /// arrived.
    pub fn receive(&mut self, buf: &mut [u8]) -> usize {
        let mut count = 0;

        for slot in buf.iter_mut() {
            match self.rx_buf.pop() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }

        count
    }

    /// Bytes lost to receive queue overflow since construction.
    pub fn rx_overruns(&self) -> u32 {
        self.rx_buf.overruns()
    }

    /// Bytes lost to transmit queue overflow since construction.
    pub fn tx_overruns(&self) -> u32 {
        self.tx_buf.overruns()
    }

    /// Stages and sends at most one packet from the transmit queue.
    ///
    /// A busy endpoint (`WouldBlock`) is not an error: all state is left in
    /// place and the next completion interrupt or `send` call retries. Other
    /// endpoint errors propagate.
    pub fn flush(&mut self) -> Result<()> {
        let stage = &mut self.stage;

        while stage.len < PACKET_SIZE {
            match self.tx_buf.pop() {
                Some(byte) => {
                    stage.buf[stage.len] = byte;
                    stage.len += 1;
                }
                None => break,
            }
        }

        if stage.len == 0 && !stage.zlp_pending {
            // Steady-state idle: nothing queued, no transfer to terminate.
            return Ok(());
        }

        match self.inner.write_packet(&stage.buf[..stage.len]) {
            Ok(_) => {
                stage.zlp_pending = stage.len == PACKET_SIZE;
                stage.len = 0;
                Ok(())
            }
            Err(UsbError::WouldBlock) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Whether the transmit queue, the staging buffer and the packet framing
    /// are all drained.
    pub(crate) fn tx_idle(&self) -> bool {
        self.tx_buf.is_empty() && self.stage.len == 0 && !self.stage.zlp_pending
    }
}

impl<B: UsbBus, const RX: usize, const TX: usize> UsbClass<B> for SerialPort<'_, B, RX, TX> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        self.inner.get_configuration_descriptors(writer)
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.rx_buf.clear();
        self.tx_buf.clear();
        self.stage = TxStage::new();
        // `connected` tracks cable presence, not bus state; a bus reset while
        // the cable stays plugged in must not clear it.
    }

    fn poll(&mut self) {
        self.flush().ok();
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if addr != self.inner.read_ep.address() {
            return;
        }

        let mut packet = [0u8; PACKET_SIZE];
        if let Ok(count) = self.inner.read_packet(&mut packet) {
            // No backpressure towards the host: if the queue is full the
            // oldest unread bytes are lost and rx_overruns advances.
            for &byte in &packet[..count] {
                self.rx_buf.push(byte);
            }
        }
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr == self.inner.write_ep.address() {
            self.flush().ok();
        }
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        self.inner.control_in(xfer);
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        self.inner.control_out(xfer);
    }
}
