/*!
# pacesim core

Deterministic building blocks for a paced packet sender running on a
virtual clock.

* [`Scheduler`]: the virtual-time event queue, owner of the clock;
* [`Transport`]: the capability a sender needs from a network stack
  (`bind`, `connect`, `send`, `close`);
* [`PacedSender`]: streams a bounded number of fixed-size packets at a
  target rate, one scheduled emission at a time;
* [`CongestionTraceSink`]: writes congestion window changes to a
  tab-separated trace file.

Everything runs on a single thread: the owner of the [`Scheduler`] pops
the next event and hands it to the component it names.

```
use pacesim_core::{
    app::{AppId, AppTimer, PacedSender},
    measure::DataRate,
    transport::{Payload, Transport, TransportError},
    Scheduler, SimTime,
};

#[derive(Default)]
struct Counter(u64);

impl Transport for Counter {
    type Address = &'static str;
    fn bind(&mut self) -> Result<(), TransportError> { Ok(()) }
    fn connect(&mut self, _: &&'static str) -> Result<(), TransportError> { Ok(()) }
    fn send(&mut self, _: Payload) -> Result<(), TransportError> {
        self.0 += 1;
        Ok(())
    }
    fn close(&mut self) -> Result<(), TransportError> { Ok(()) }
}

let mut scheduler = Scheduler::<AppTimer>::new();
let mut sender = PacedSender::new(AppId::new(0));
sender
    .configure(Counter::default(), "sink", 1460, 3, DataRate::from_mbps(100))
    .unwrap();

sender.activate(&mut scheduler).unwrap();
while let Some((_, _timer)) = scheduler.pop() {
    sender.on_timer(&mut scheduler).unwrap();
}

assert_eq!(sender.connection().unwrap().0, 3);
assert_eq!(scheduler.now(), SimTime::from_nanos(233_600));
```
*/

pub mod app;
pub mod measure;
pub mod scheduler;
pub mod time;
pub mod trace;
pub mod transport;

pub use self::{
    app::{AppId, AppTimer, PacedSender, SenderState},
    measure::{DataRate, ErrorModel, ErrorUnit},
    scheduler::{EventId, Scheduler},
    time::SimTime,
    trace::{CONGESTION_WINDOW, CongestionTraceSink, TracedWindow, WindowObserver},
    transport::{Payload, Transport, TransportError},
};
