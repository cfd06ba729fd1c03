// Sequencer module
// Tick timeline, note events, arrangement and real-time playback

pub mod arrangement;
pub mod clock;
pub mod events;
pub mod note;
pub mod player;
pub mod session;
pub mod timeline;
pub mod transport;

pub use arrangement::Arrangement;
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{ExportSequence, PlaybackEvent};
pub use note::{Instrument, NoteEvent};
pub use player::{PlaybackState, Player};
pub use session::{PlaybackMonitor, PlaybackSession, SessionOptions};
pub use timeline::{MusicalTime, TICKS_PER_BAR, TICKS_PER_QUARTER, Tempo, Tick};
pub use transport::{Transport, TransportState};
