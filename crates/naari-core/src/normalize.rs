use std::collections::HashMap;

use crate::model::{Device, PollResult};

/// Stamp registry ids onto results by address.
///
/// Results with no matching device (e.g. one removed from config while a
/// poll was in flight) pass through unchanged.
pub fn attach_identity(results: Vec<PollResult>, devices: &[Device]) -> Vec<PollResult> {
    let ids: HashMap<&str, &Device> = devices.iter().map(|d| (d.address.as_str(), d)).collect();

    results
        .into_iter()
        .map(|result| match ids.get(result.address()) {
            Some(device) => result.with_device_id(device.id.clone()),
            None => result,
        })
        .collect()
}
