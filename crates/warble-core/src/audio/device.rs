//! Output device lookup
//!
//! A configured [`DeviceId`] may name a device on any available cpal host
//! (ALSA, JACK, PulseAudio, CoreAudio, WASAPI...).

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// Find a device by its ID
///
/// Uses the host named in the ID when it is available, otherwise searches
/// every host by device name.
pub fn find_device(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(host) = id.host.as_deref().and_then(host_by_name) {
        return host
            .output_devices()
            .map_err(|e| AudioError::NoUsableConfig(e.to_string()))?
            .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    cpal::available_hosts()
        .into_iter()
        .filter_map(|host_id| cpal::host_from_id(host_id).ok())
        .filter_map(|host| host.output_devices().ok())
        .flatten()
        .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
        .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))
}

/// Default output device of the default host
pub fn default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)
}

/// Configured device, or the default if none is configured
pub fn select_device(id: Option<&DeviceId>) -> AudioResult<cpal::Device> {
    match id {
        Some(id) => find_device(id),
        None => default_device(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_host_names_are_display_cased() {
        assert_eq!(host_name(HostId::Alsa), "ALSA");
    }

    #[test]
    fn test_unknown_device_not_found() {
        let id = DeviceId {
            name: "warble-test-device-that-does-not-exist".to_string(),
            host: None,
        };
        assert!(matches!(find_device(&id), Err(AudioError::DeviceNotFound(_))));
    }
}
