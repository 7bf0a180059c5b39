use crate::serial_port::SerialPort;
use usb_device::bus::UsbBus;
use usb_device::UsbError;

impl<B: UsbBus, const RX: usize, const TX: usize> embedded_hal::serial::Write<u8>
    for SerialPort<'_, B, RX, TX>
{
    type Error = UsbError;

    /// Queues one byte. Unlike [`SerialPort::send`], this refuses with
    /// `WouldBlock` instead of overwriting when the transmit queue is full,
    /// since the trait contract expects backpressure.
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        if self.tx_buf.is_full() {
            // Full queue: try to move a packet out before giving up.
            match self.flush() {
                Ok(_) => {}
                Err(err) => return Err(nb::Error::Other(err)),
            }

            if self.tx_buf.is_full() {
                return Err(nb::Error::WouldBlock);
            }
        }

        self.tx_buf.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        match <SerialPort<'_, B, RX, TX>>::flush(self) {
            Ok(_) => {
                if self.tx_idle() {
                    Ok(())
                } else {
                    Err(nb::Error::WouldBlock)
                }
            }
            Err(err) => Err(nb::Error::Other(err)),
        }
    }
}

impl<B: UsbBus, const RX: usize, const TX: usize> embedded_hal::serial::Read<u8>
    for SerialPort<'_, B, RX, TX>
{
    type Error = UsbError;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.rx_buf.pop().ok_or(nb::Error::WouldBlock)
    }
}
