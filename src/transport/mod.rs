// src/transport/mod.rs

pub mod envelope;
pub mod session;

pub use envelope::{Envelope, GroundSteeringRequest};
pub use session::{Od4Session, OD4_PORT};

use crate::reference::ReferenceSteering;
use tracing::{debug, warn};

/// Keep `reference` updated with every GroundSteeringRequest received on
/// `session`.
pub fn listen_ground_steering(session: &mut Od4Session, reference: ReferenceSteering) {
    session.data_trigger(GroundSteeringRequest::ID, move |envelope| {
        match GroundSteeringRequest::decode(&envelope.serialized_data) {
            Ok(request) => {
                reference.set(request.ground_steering);
                debug!(
                    "Reference steering {} (sampled at {} µs)",
                    request.ground_steering,
                    envelope.sample_time.to_micros()
                );
            }
            Err(e) => warn!("Undecodable GroundSteeringRequest: {:#}", e),
        }
    });
}
