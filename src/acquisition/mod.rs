// Acquisition module - sensor capability and sample handoff
//
// The analysis core never talks to hardware. Acquisition produces an
// owned TimeSeries snapshot which is then handed to the pipeline.
//
// - channel: ScalarChannel capability plus a simulated damped oscillator
// - recorder: paced sampling thread pushing into an rtrb SPSC ring

mod channel;
mod recorder;

pub use channel::{ScalarChannel, SimulatedChannel};
pub use recorder::{Recorder, Recording, RecordingStats, DEFAULT_RING_CAPACITY};
