#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::Duration;

use i2c_master_bus::{
    BusConfig, ClockSource, DeviceAddress, DeviceConfig, I2cEngine, Status,
    Timeout,
};

// ---------------------------------------------------------------------------
// Mock engine
// ---------------------------------------------------------------------------

pub const PORT_COUNT: u8 = 2;
pub const PIN_COUNT: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockBus(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockDevice(u32);

/// One completed transaction, as seen on the wire of `port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Write { port: u8, addr: u16, data: Vec<u8> },
    Read { port: u8, addr: u16, len: usize },
    WriteRead { port: u8, addr: u16, write: Vec<u8>, read_len: usize },
}

impl Transfer {
    pub fn addr(&self) -> u16 {
        match self {
            Transfer::Write { addr, .. }
            | Transfer::Read { addr, .. }
            | Transfer::WriteRead { addr, .. } => *addr,
        }
    }
}

/// A simulated target: 256 bytes of memory behind a one-byte pointer, the
/// way a small serial EEPROM behaves. The first written byte sets the
/// pointer, further bytes are stored, reads stream out from the pointer.
#[derive(Debug, Clone)]
pub struct Peripheral {
    memory: Vec<u8>,
    pointer: usize,
    /// Time the target needs before it completes a transaction.
    response_ms: u32,
    /// Refuse every transaction with a NACK.
    nack: bool,
}

impl Peripheral {
    pub fn new() -> Self {
        Self { memory: vec![0; 256], pointer: 0, response_ms: 0, nack: false }
    }

    pub fn with_memory(mut self, offset: usize, data: &[u8]) -> Self {
        self.memory[offset..offset + data.len()].copy_from_slice(data);
        self
    }

    pub fn with_response_ms(mut self, response_ms: u32) -> Self {
        self.response_ms = response_ms;
        self
    }

    pub fn nacking(mut self) -> Self {
        self.nack = true;
        self
    }

    fn store(&mut self, data: &[u8]) {
        if let Some((&pointer, rest)) = data.split_first() {
            self.pointer = pointer as usize;
            for byte in rest {
                self.memory[self.pointer] = *byte;
                self.pointer = (self.pointer + 1) % self.memory.len();
            }
        }
    }

    fn load(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.memory[self.pointer];
            self.pointer = (self.pointer + 1) % self.memory.len();
        }
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }
}

struct OpenBus {
    config: BusConfig,
    devices: usize,
}

struct Session {
    port: u8,
    bus: MockBus,
    config: DeviceConfig,
}

#[derive(Default)]
struct State {
    buses: HashMap<MockBus, OpenBus>,
    sessions: HashMap<MockDevice, Session>,
    peripherals: HashMap<(u8, DeviceAddress), Peripheral>,
    log: Vec<Transfer>,
    /// If set, the next engine call fails with this status.
    fail_next: Option<Status>,
    next_id: u32,
    counters: MockCounters,
}

/// Counters for tracking engine calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockCounters {
    pub opens: usize,
    pub closes: usize,
    pub attaches: usize,
    pub detaches: usize,
    /// Transactions issued, including failed ones.
    pub transfers: usize,
}

/// Engine double that records everything it is asked to do.
///
/// The state lock is held for the whole of each call, so transactions on a
/// port are strictly one at a time, like a real engine's queue.
pub struct MockEngine {
    state: Mutex<State>,
    max_devices: usize,
    max_scl_speed_hz: u32,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::with_limits(4, 1_000_000)
    }

    pub fn with_limits(max_devices: usize, max_scl_speed_hz: u32) -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_devices,
            max_scl_speed_hz,
        }
    }

    /// Place a responding target at `address` on `port`.
    pub fn add_peripheral(
        &self,
        port: u8,
        address: impl Into<DeviceAddress>,
        peripheral: Peripheral,
    ) {
        self.state
            .lock()
            .unwrap()
            .peripherals
            .insert((port, address.into()), peripheral);
    }

    pub fn peripheral(
        &self,
        port: u8,
        address: impl Into<DeviceAddress>,
    ) -> Option<Peripheral> {
        self.state
            .lock()
            .unwrap()
            .peripherals
            .get(&(port, address.into()))
            .cloned()
    }

    pub fn fail_next(&self, status: Status) {
        self.state.lock().unwrap().fail_next = Some(status);
    }

    pub fn counters(&self) -> MockCounters {
        self.state.lock().unwrap().counters
    }

    pub fn open_buses(&self) -> usize {
        self.state.lock().unwrap().buses.len()
    }

    pub fn attached_devices(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Completed transactions on `port`, in bus order.
    pub fn log(&self, port: u8) -> Vec<Transfer> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|t| match t {
                Transfer::Write { port: p, .. }
                | Transfer::Read { port: p, .. }
                | Transfer::WriteRead { port: p, .. } => *p == port,
            })
            .cloned()
            .collect()
    }

    /// Look up the target behind `device` and check it answers in time.
    fn target<'s>(
        state: &'s mut State,
        device: MockDevice,
        timeout: Timeout,
    ) -> Result<(u8, u16, &'s mut Peripheral), Status> {
        state.counters.transfers += 1;
        if let Some(status) = state.fail_next.take() {
            return Err(status);
        }
        let session =
            state.sessions.get(&device).ok_or(Status::InvalidState)?;
        let (port, address) = (session.port, session.config.address);

        // Nobody home, or the target refuses: either way the address byte
        // is not acknowledged.
        let peripheral = match state.peripherals.get_mut(&(port, address)) {
            Some(p) if !p.nack => p,
            _ => return Err(Status::Fail),
        };
        if let Some(ms) = timeout.as_millis() {
            if ms < peripheral.response_ms {
                return Err(Status::Timeout);
            }
        }
        Ok((port, address.address, peripheral))
    }
}

impl I2cEngine for MockEngine {
    type Bus = MockBus;
    type Device = MockDevice;

    fn open_bus(&self, config: &BusConfig) -> Result<MockBus, Status> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.fail_next.take() {
            return Err(status);
        }
        if config.port >= PORT_COUNT
            || config.sda >= PIN_COUNT
            || config.scl >= PIN_COUNT
            || config.clock_source == ClockSource::RcFast
        {
            return Err(Status::InvalidArg);
        }
        let taken = state.buses.values().any(|b| {
            b.config.port == config.port
                || [b.config.sda, b.config.scl].contains(&config.sda)
                || [b.config.sda, b.config.scl].contains(&config.scl)
        });
        if taken {
            return Err(Status::InvalidState);
        }

        state.next_id += 1;
        let bus = MockBus(state.next_id);
        state.buses.insert(bus, OpenBus { config: *config, devices: 0 });
        state.counters.opens += 1;
        Ok(bus)
    }

    fn close_bus(&self, bus: MockBus) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.fail_next.take() {
            return Err(status);
        }
        match state.buses.get(&bus) {
            None => return Err(Status::InvalidState),
            Some(open) if open.devices > 0 => return Err(Status::InvalidState),
            Some(_) => {}
        }
        state.buses.remove(&bus);
        state.counters.closes += 1;
        Ok(())
    }

    fn attach_device(
        &self,
        bus: MockBus,
        config: &DeviceConfig,
    ) -> Result<MockDevice, Status> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.fail_next.take() {
            return Err(status);
        }
        let open = state.buses.get(&bus).ok_or(Status::InvalidState)?;
        if open.devices >= self.max_devices {
            return Err(Status::NoMem);
        }
        let port = open.config.port;

        state.next_id += 1;
        let device = MockDevice(state.next_id);
        state.sessions.insert(device, Session { port, bus, config: *config });
        if let Some(open) = state.buses.get_mut(&bus) {
            open.devices += 1;
        }
        state.counters.attaches += 1;
        Ok(device)
    }

    fn detach_device(&self, device: MockDevice) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.fail_next.take() {
            return Err(status);
        }
        let session = state.sessions.remove(&device).ok_or(Status::NotFound)?;
        if let Some(open) = state.buses.get_mut(&session.bus) {
            open.devices -= 1;
        }
        state.counters.detaches += 1;
        Ok(())
    }

    fn write(
        &self,
        device: MockDevice,
        data: &[u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        let (port, addr, peripheral) =
            Self::target(&mut state, device, timeout)?;
        peripheral.store(data);
        state.log.push(Transfer::Write { port, addr, data: data.to_vec() });
        Ok(())
    }

    fn read(
        &self,
        device: MockDevice,
        buf: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        let (port, addr, peripheral) =
            Self::target(&mut state, device, timeout)?;
        peripheral.load(buf);
        state.log.push(Transfer::Read { port, addr, len: buf.len() });
        Ok(())
    }

    fn write_read(
        &self,
        device: MockDevice,
        write: &[u8],
        read: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        let (port, addr, peripheral) =
            Self::target(&mut state, device, timeout)?;
        peripheral.store(write);
        peripheral.load(read);
        state.log.push(Transfer::WriteRead {
            port,
            addr,
            write: write.to_vec(),
            read_len: read.len(),
        });
        Ok(())
    }

    fn max_scl_speed_hz(&self) -> u32 {
        self.max_scl_speed_hz
    }
}

// ---------------------------------------------------------------------------
// Queued engine
// ---------------------------------------------------------------------------

/// How long a caller waits for its turn on the worker.
pub const QUEUE_TIMEOUT: Duration = Duration::from_secs(2);

/// Engine that serializes session setup and teardown through a worker
/// thread, the way a driver with an internal request queue does.
///
/// The worker enters a critical section before granting each turn, so a
/// caller that is itself inside one never gets its turn and fails with
/// `Status::Timeout`.
pub struct QueuedEngine {
    inner: MockEngine,
    queue: mpsc::Sender<mpsc::Sender<()>>,
}

impl QueuedEngine {
    pub fn new() -> Self {
        let (queue, requests) = mpsc::channel::<mpsc::Sender<()>>();
        thread::spawn(move || {
            for turn in requests {
                critical_section::with(|_| ());
                let _ = turn.send(());
            }
        });
        Self { inner: MockEngine::new(), queue }
    }

    pub fn inner(&self) -> &MockEngine {
        &self.inner
    }

    fn wait_turn(&self) -> Result<(), Status> {
        let (turn, granted) = mpsc::channel();
        self.queue.send(turn).map_err(|_| Status::Fail)?;
        granted.recv_timeout(QUEUE_TIMEOUT).map_err(|_| Status::Timeout)
    }
}

impl I2cEngine for QueuedEngine {
    type Bus = MockBus;
    type Device = MockDevice;

    fn open_bus(&self, config: &BusConfig) -> Result<MockBus, Status> {
        self.inner.open_bus(config)
    }

    fn close_bus(&self, bus: MockBus) -> Result<(), Status> {
        self.inner.close_bus(bus)
    }

    fn attach_device(
        &self,
        bus: MockBus,
        config: &DeviceConfig,
    ) -> Result<MockDevice, Status> {
        self.wait_turn()?;
        self.inner.attach_device(bus, config)
    }

    fn detach_device(&self, device: MockDevice) -> Result<(), Status> {
        self.wait_turn()?;
        self.inner.detach_device(device)
    }

    fn write(
        &self,
        device: MockDevice,
        data: &[u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        self.inner.write(device, data, timeout)
    }

    fn read(
        &self,
        device: MockDevice,
        buf: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        self.inner.read(device, buf, timeout)
    }

    fn write_read(
        &self,
        device: MockDevice,
        write: &[u8],
        read: &mut [u8],
        timeout: Timeout,
    ) -> Result<(), Status> {
        self.inner.write_read(device, write, read, timeout)
    }
}
