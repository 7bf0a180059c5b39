#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use usb_device::bus::{PollResult, UsbBus};
use usb_device::endpoint::{EndpointAddress, EndpointType};
use usb_device::{Result, UsbDirection, UsbError};

#[derive(Default)]
struct State {
    endpoints: Vec<(EndpointAddress, EndpointType)>,
    writes: Vec<(EndpointAddress, Vec<u8>)>,
    reads: Vec<(EndpointAddress, Vec<u8>)>,
    busy: bool,
    next_in: usize,
    next_out: usize,
}

/// In-memory `UsbBus` that records packets written by the class under test
/// and serves queued packets to its OUT endpoints.
pub struct MockBus {
    state: Arc<Mutex<State>>,
}

/// Assertion-side handle to a [`MockBus`] that has been moved into a
/// `UsbBusAllocator`.
#[derive(Clone)]
pub struct BusHandle {
    state: Arc<Mutex<State>>,
}

pub fn mock_bus() -> (MockBus, BusHandle) {
    let state = Arc::new(Mutex::new(State::default()));

    (
        MockBus {
            state: state.clone(),
        },
        BusHandle { state },
    )
}

impl BusHandle {
    /// Removes and returns all packets written so far, oldest first.
    pub fn take_writes(&self) -> Vec<(EndpointAddress, Vec<u8>)> {
        std::mem::take(&mut self.state.lock().unwrap().writes)
    }

    /// Makes every subsequent endpoint write fail with `WouldBlock`.
    pub fn set_busy(&self, busy: bool) {
        self.state.lock().unwrap().busy = busy;
    }

    /// Queues a packet for delivery on an OUT endpoint.
    pub fn push_packet(&self, ep: EndpointAddress, data: &[u8]) {
        self.state.lock().unwrap().reads.push((ep, data.to_vec()));
    }

    pub fn bulk_in_ep(&self) -> EndpointAddress {
        self.find_bulk(UsbDirection::In)
    }

    pub fn bulk_out_ep(&self) -> EndpointAddress {
        self.find_bulk(UsbDirection::Out)
    }

    fn find_bulk(&self, dir: UsbDirection) -> EndpointAddress {
        self.state
            .lock()
            .unwrap()
            .endpoints
            .iter()
            .find(|(addr, ty)| matches!(ty, EndpointType::Bulk) && addr.direction() == dir)
            .map(|(addr, _)| *addr)
            .expect("no bulk endpoint allocated")
    }
}

impl UsbBus for MockBus {
    fn alloc_ep(
        &mut self,
        ep_dir: UsbDirection,
        ep_addr: Option<EndpointAddress>,
        ep_type: EndpointType,
        _max_packet_size: u16,
        _interval: u8,
    ) -> Result<EndpointAddress> {
        let mut state = self.state.lock().unwrap();

        let addr = ep_addr.unwrap_or_else(|| {
            let index = if matches!(ep_type, EndpointType::Control) {
                0
            } else {
                match ep_dir {
                    UsbDirection::In => {
                        state.next_in += 1;
                        state.next_in
                    }
                    UsbDirection::Out => {
                        state.next_out += 1;
                        state.next_out
                    }
                }
            };
            EndpointAddress::from_parts(index, ep_dir)
        });

        state.endpoints.push((addr, ep_type));
        Ok(addr)
    }

    fn enable(&mut self) {}

    fn reset(&self) {}

    fn set_device_address(&self, _addr: u8) {}

    fn write(&self, ep_addr: EndpointAddress, buf: &[u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();

        if state.busy {
            return Err(UsbError::WouldBlock);
        }

        state.writes.push((ep_addr, buf.to_vec()));
        Ok(buf.len())
    }

    fn read(&self, ep_addr: EndpointAddress, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();

        match state.reads.iter().position(|(addr, _)| *addr == ep_addr) {
            Some(pos) => {
                let (_, data) = state.reads.remove(pos);
                if data.len() > buf.len() {
                    return Err(UsbError::BufferOverflow);
                }
                buf[..data.len()].copy_from_slice(&data);
                Ok(data.len())
            }
            None => Err(UsbError::WouldBlock),
        }
    }

    fn set_stalled(&self, _ep_addr: EndpointAddress, _stalled: bool) {}

    fn is_stalled(&self, _ep_addr: EndpointAddress) -> bool {
        false
    }

    fn suspend(&self) {}

    fn resume(&self) {}

    fn poll(&self) -> PollResult {
        PollResult::None
    }
}
