use usb_device::class_prelude::*;
use usb_device::Result;

/// USB device class code for CDC, for use with `UsbDeviceBuilder::device_class`.
pub const USB_CLASS_CDC: u8 = 0x02;
const USB_CLASS_CDC_DATA: u8 = 0x0a;
const CDC_SUBCLASS_ACM: u8 = 0x02;
const CDC_PROTOCOL_AT: u8 = 0x01;

const CS_INTERFACE: u8 = 0x24;
const CDC_TYPE_HEADER: u8 = 0x00;
const CDC_TYPE_CALL_MANAGEMENT: u8 = 0x01;
const CDC_TYPE_ACM: u8 = 0x02;
const CDC_TYPE_UNION: u8 = 0x06;

const REQ_SET_LINE_CODING: u8 = 0x20;
const REQ_GET_LINE_CODING: u8 = 0x21;
const REQ_SET_CONTROL_LINE_STATE: u8 = 0x22;

const CDC_NOTIFY_SERIAL_STATE: u8 = 0x20;

/// Size of the line coding structure on the wire.
const LINE_CODING_SIZE: usize = 7;

/// Max packet size of the interrupt notification endpoint.
const NOTIF_PACKET_SIZE: u16 = 16;

/// Polling interval of the interrupt notification endpoint, in frames.
const NOTIF_POLL_INTERVAL: u8 = 255;

/// Low-level CDC-ACM class.
///
/// Exposes one comm (control) interface with an interrupt notification
/// endpoint and one data interface with a bulk endpoint pair. Handles the
/// class-specific control requests and stores the session's line coding;
/// moving actual data is left to the caller via [`read_packet`](Self::read_packet)
/// and [`write_packet`](Self::write_packet), or to the buffered
/// [`SerialPort`](crate::SerialPort) built on top of this.
pub struct CdcAcmClass<'a, B: UsbBus> {
    comm_if: InterfaceNumber,
    comm_ep: EndpointIn<'a, B>,
    data_if: InterfaceNumber,
    pub(crate) read_ep: EndpointOut<'a, B>,
    pub(crate) write_ep: EndpointIn<'a, B>,
    line_coding: LineCoding,
    dtr: bool,
    rts: bool,
}

impl<'a, B: UsbBus> CdcAcmClass<'a, B> {
    /// Creates a new CdcAcmClass with the provided UsbBus and `max_packet_size` in bytes. For
    /// full-speed devices, `max_packet_size` has to be one of 8, 16, 32 or 64.
    pub fn new(alloc: &'a UsbBusAllocator<B>, max_packet_size: u16) -> CdcAcmClass<'a, B> {
        CdcAcmClass {
            comm_if: alloc.interface(),
            comm_ep: alloc.interrupt(NOTIF_PACKET_SIZE, NOTIF_POLL_INTERVAL),
            data_if: alloc.interface(),
            read_ep: alloc.bulk(max_packet_size),
            write_ep: alloc.bulk(max_packet_size),
            line_coding: LineCoding::default(),
            dtr: false,
            rts: false,
        }
    }

    /// Gets the maximum packet size of the data endpoints in bytes.
    pub fn max_packet_size(&self) -> u16 {
        // read_ep and write_ep are always allocated with the same size
        self.read_ep.max_packet_size()
    }

    /// Gets the current line coding. Stored on behalf of the host; this class never applies it to
    /// any hardware.
    pub fn line_coding(&self) -> &LineCoding {
        &self.line_coding
    }

    /// Gets the DTR (data terminal ready) state.
    pub fn dtr(&self) -> bool {
        self.dtr
    }

    /// Gets the RTS (request to send) state.
    pub fn rts(&self) -> bool {
        self.rts
    }

    /// Writes a single packet into the IN endpoint.
    pub fn write_packet(&self, data: &[u8]) -> Result<usize> {
        self.write_ep.write(data)
    }

    /// Reads a single packet from the OUT endpoint.
    pub fn read_packet(&self, data: &mut [u8]) -> Result<usize> {
        self.read_ep.read(data)
    }
}

impl<B: UsbBus> UsbClass<B> for CdcAcmClass<'_, B> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        writer.interface(
            self.comm_if,
            USB_CLASS_CDC,
            CDC_SUBCLASS_ACM,
            CDC_PROTOCOL_AT,
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_HEADER, // bDescriptorSubtype
                0x10,
                0x01, // bcdCDC (1.10)
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_CALL_MANAGEMENT, // bDescriptorSubtype
                0x00,                     // bmCapabilities
                self.data_if.into(),      // bDataInterface
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_ACM, // bDescriptorSubtype
                0x00,         // bmCapabilities
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_UNION,      // bDescriptorSubtype
                self.comm_if.into(), // bControlInterface
                self.data_if.into(), // bSubordinateInterface
            ],
        )?;

        writer.endpoint(&self.comm_ep)?;

        writer.interface(self.data_if, USB_CLASS_CDC_DATA, 0x00, 0x00)?;

        writer.endpoint(&self.write_ep)?;
        writer.endpoint(&self.read_ep)?;

        Ok(())
    }

    fn reset(&mut self) {
        self.line_coding = LineCoding::default();
        self.dtr = false;
        self.rts = false;
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = xfer.request();

        if !(req.request_type == control::RequestType::Class
            && req.recipient == control::Recipient::Interface
            && req.index == u8::from(self.comm_if) as u16)
        {
            return;
        }

        match req.request {
            REQ_GET_LINE_CODING if req.length as usize >= LINE_CODING_SIZE => {
                let coding = self.line_coding.to_bytes();
                xfer.accept(|data| {
                    data[..LINE_CODING_SIZE].copy_from_slice(&coding);
                    Ok(LINE_CODING_SIZE)
                })
                .ok();
            }
            _ => {
                xfer.reject().ok();
            }
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = xfer.request();

        if !(req.request_type == control::RequestType::Class
            && req.recipient == control::Recipient::Interface
            && req.index == u8::from(self.comm_if) as u16)
        {
            return;
        }

        match req.request {
            REQ_SET_LINE_CODING if xfer.data().len() >= LINE_CODING_SIZE => {
                if let Some(coding) = LineCoding::from_bytes(xfer.data()) {
                    self.line_coding = coding;
                }
                xfer.accept().ok();
            }
            REQ_SET_CONTROL_LINE_STATE => {
                self.dtr = (req.value & 0x0001) != 0;
                self.rts = (req.value & 0x0002) != 0;

                // The CDC spec makes the SERIAL_STATE notification optional, but the
                // Linux cdc_acm driver dereferences a null notification handler when
                // it never arrives. Echo the line state bits back to keep it happy.
                let notif = serial_state_notification(req.value);
                self.comm_ep.write(&notif).ok();

                xfer.accept().ok();
            }
            _ => {
                xfer.reject().ok();
            }
        }
    }
}

/// Composes the 10-byte SERIAL_STATE notification sent on the interrupt
/// endpoint in response to SET_CONTROL_LINE_STATE, echoing the low two bits
/// (DTR/RTS) of the request value.
pub(crate) fn serial_state_notification(line_state: u16) -> [u8; 10] {
    let value = line_state & 0x0003;

    [
        0xa1, // bmRequestType: device-to-host, class, interface
        CDC_NOTIFY_SERIAL_STATE,
        0x00, // wValue
        0x00,
        0x00, // wIndex
        0x00,
        0x02, // wLength
        0x00,
        value as u8, // 2-byte serial state
        (value >> 8) as u8,
    ]
}

/// Number of stop bits for LineCoding.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit
    One = 0,

    /// 1.5 stop bits
    OnePointFive = 1,

    /// 2 stop bits
    Two = 2,
}

impl StopBits {
    fn from_byte(value: u8) -> Self {
        match value {
            0 => StopBits::One,
            1 => StopBits::OnePointFive,
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

/// Parity for LineCoding.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParityType {
    None = 0,
    Odd = 1,
    Even = 2,
    Mark = 3,
    Space = 4,
}

impl ParityType {
    fn from_byte(value: u8) -> Self {
        match value {
            0 => ParityType::None,
            1 => ParityType::Odd,
            2 => ParityType::Even,
            3 => ParityType::Mark,
            4 => ParityType::Space,
            _ => ParityType::None,
        }
    }
}

/// Line coding parameters
///
/// This is provided by the host for specifying the standard UART parameters such as baud rate. Can
/// be ignored if you don't plan to interface with a physical UART.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineCoding {
    stop_bits: StopBits,
    data_bits: u8,
    parity_type: ParityType,
    data_rate: u32,
}

impl LineCoding {
    /// Gets the number of stop bits for UART communication.
    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    /// Gets the number of data bits for UART communication.
    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }

    /// Gets the parity type for UART communication.
    pub fn parity_type(&self) -> ParityType {
        self.parity_type
    }

    /// Gets the data rate in bits per second for UART communication.
    pub fn data_rate(&self) -> u32 {
        self.data_rate
    }

    /// Parses a line coding from its 7-byte wire format. Returns `None` if
    /// `data` is too short. Out-of-range stop bit or parity values fall back
    /// to their defaults; the host is the authority on the rest.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < LINE_CODING_SIZE {
            return None;
        }

        Some(LineCoding {
            data_rate: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            stop_bits: StopBits::from_byte(data[4]),
            parity_type: ParityType::from_byte(data[5]),
            data_bits: data[6],
        })
    }

    /// Serializes the line coding into its 7-byte wire format.
    pub fn to_bytes(&self) -> [u8; LINE_CODING_SIZE] {
        let rate = self.data_rate.to_le_bytes();

        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits as u8,
            self.parity_type as u8,
            self.data_bits,
        ]
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        LineCoding {
            stop_bits: StopBits::One,
            data_bits: 8,
            parity_type: ParityType::None,
            data_rate: 9600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_state_notification_layout() {
        let notif = serial_state_notification(0b101);

        // Header: bmRequestType, SERIAL_STATE, wValue = 0, wIndex = 0, wLength = 2
        assert_eq!(notif[..8], [0xa1, 0x20, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);
        // Trailing value is the request value masked to its low two bits.
        assert_eq!(notif[8..], [0x01, 0x00]);
    }

    #[test]
    fn serial_state_notification_masks_to_two_bits() {
        let notif = serial_state_notification(0xffff);
        assert_eq!(notif[8..], [0x03, 0x00]);

        let notif = serial_state_notification(0);
        assert_eq!(notif[8..], [0x00, 0x00]);
    }

    #[test]
    fn line_coding_round_trip() {
        let wire = [0x00, 0xc2, 0x01, 0x00, 0x02, 0x01, 0x07];
        let coding = LineCoding::from_bytes(&wire).unwrap();

        assert_eq!(coding.data_rate(), 115_200);
        assert_eq!(coding.stop_bits(), StopBits::Two);
        assert_eq!(coding.parity_type(), ParityType::Odd);
        assert_eq!(coding.data_bits(), 7);

        assert_eq!(coding.to_bytes(), wire);
    }

    #[test]
    fn short_line_coding_is_rejected() {
        assert_eq!(LineCoding::from_bytes(&[0x80, 0x25, 0x00]), None);
        assert_eq!(LineCoding::from_bytes(&[]), None);
    }

    #[test]
    fn out_of_range_fields_fall_back_to_defaults() {
        let coding = LineCoding::from_bytes(&[0x80, 0x25, 0x00, 0x00, 0x09, 0x09, 0x08]).unwrap();

        assert_eq!(coding.stop_bits(), StopBits::One);
        assert_eq!(coding.parity_type(), ParityType::None);
    }
}
