use embedded_hal::digital::v2::{InputPin, OutputPin};

/// Presence control consumed by the VBUS lifecycle: makes the device appear
/// on, or drop off, the bus. On most hardware this is a D+ pull-up resistor
/// switched by a GPIO, or the peripheral's soft-connect register.
pub trait BusControl {
    /// Start advertising presence to the host.
    fn connect(&mut self);

    /// Force a bus disconnect so the host sees an immediate device removal.
    fn disconnect(&mut self);
}

/// [`BusControl`] through an active-high pull-up enable pin.
pub struct SoftConnect<P> {
    pin: P,
}

impl<P: OutputPin> SoftConnect<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Releases the underlying pin.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> BusControl for SoftConnect<P> {
    fn connect(&mut self) {
        self.pin.set_high().ok();
    }

    fn disconnect(&mut self) {
        self.pin.set_low().ok();
    }
}

/// Edge-triggered cable presence tracking from a VBUS sense pin.
///
/// Polling is cheap and may happen as often as the application likes; the
/// engine is only told about presence on actual signal edges, never on
/// repeated polls of an unchanged level.
pub struct VbusMonitor<V> {
    pin: V,
    connected: bool,
}

impl<V: InputPin> VbusMonitor<V> {
    /// Creates a monitor that starts out disconnected.
    pub fn new(pin: V) -> Self {
        Self {
            pin,
            connected: false,
        }
    }

    /// Samples the VBUS pin and, on a change, tells `bus` to connect or
    /// disconnect. Returns the current cable presence.
    pub fn poll<C: BusControl>(&mut self, bus: &mut C) -> core::result::Result<bool, V::Error> {
        let present = self.pin.is_high()?;

        if present != self.connected {
            self.connected = present;
            if present {
                bus.connect();
            } else {
                bus.disconnect();
            }
        }

        Ok(self.connected)
    }

    /// Cable presence as of the last poll.
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}
