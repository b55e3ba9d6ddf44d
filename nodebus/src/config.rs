use core::time::Duration;

/// Default inbound ring capacity in bytes.
pub const DEFAULT_RX_CAPACITY: usize = 256;

/// Default outbound ring capacity in bytes.
pub const DEFAULT_TX_CAPACITY: usize = 256;

/// Ring capacities for a bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Inbound ring capacity in bytes.
    pub rx_capacity: usize,
    /// Outbound ring capacity in bytes.
    pub tx_capacity: usize,
}

impl DriverConfig {
    /// Creates a config with the default capacities.
    pub fn new() -> Self {
        Self {
            rx_capacity: DEFAULT_RX_CAPACITY,
            tx_capacity: DEFAULT_TX_CAPACITY,
        }
    }

    /// Sets the inbound ring capacity.
    pub fn with_rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    /// Sets the outbound ring capacity.
    pub fn with_tx_capacity(mut self, capacity: usize) -> Self {
        self.tx_capacity = capacity;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parity bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Parity bit set so the count of ones is even.
    Even,
    /// Parity bit set so the count of ones is odd.
    Odd,
}

/// Number of stop bits after each character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit.
    One,
    /// One and a half stop bits.
    OnePointFive,
    /// Two stop bits.
    Two,
}

/// Line settings applied to a serial port when its driver is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Data bits per character.
    pub data_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits per character.
    pub stop_bits: StopBits,
    /// RTS/CTS hardware flow control.
    pub hw_flow_control: bool,
    /// Transmit pin number.
    pub tx_pin: u8,
    /// Receive pin number.
    pub rx_pin: u8,
    /// Upper bound on how long one physical read may block.
    pub read_timeout: Duration,
    /// Upper bound on bytes taken by one physical read.
    pub max_read_chunk: usize,
}

impl SerialConfig {
    /// Creates a config for 115200 baud 8N1 without flow control.
    pub fn new() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            hw_flow_control: false,
            tx_pin: 4,
            rx_pin: 5,
            read_timeout: Duration::from_millis(20),
            max_read_chunk: 128,
        }
    }

    /// Sets the line speed.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the parity mode.
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the stop bits.
    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Sets the transmit and receive pins.
    pub fn with_pins(mut self, tx_pin: u8, rx_pin: u8) -> Self {
        self.tx_pin = tx_pin;
        self.rx_pin = rx_pin;
        self
    }

    /// Sets how long one physical read may block.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets how many bytes one physical read may take.
    pub fn with_max_read_chunk(mut self, chunk: usize) -> Self {
        self.max_read_chunk = chunk;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new()
    }
}
