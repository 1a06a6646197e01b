//! Clock-in/clock-out core: events, the serialized state machine, the grace
//! timer and the controller task that ties them to a store.

mod controller;
mod events;
mod grace;
mod source;
mod state;
mod validation;

pub use controller::{ClockController, ControllerConfig, NoticeReceiver};
pub use events::{
    ClockEvent, ClockNotice, GeofenceTransition, ManualClockAction, ManualKind, TransitionKind,
};
pub use grace::GraceTimer;
pub use source::{Clock, ManualClock, SystemClock};
pub use state::{
    apply_edit, AwayState, ClockSnapshot, ClockState, ClockStatus, Effect, PendingExit,
    RecordEdit, StoreWrite,
};
pub use validation::{validate_edit, validate_manual_action, EditError};
