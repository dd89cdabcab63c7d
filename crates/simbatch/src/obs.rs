//! Observation dispatch.
//!
//! Each [`ObsMode`] maps to a fixed assembly of two inputs: the state
//! dictionary (`agent` proprioception plus task `extra`) and, for the sensor
//! modes, one capture of every camera.

use indexmap::IndexMap;
use simbatch_core::{ObsDict, ObsValue, Result};

use crate::config::ObsMode;
use crate::device::SimDevice;
use crate::scene::{ObjectId, Scene};
use crate::sensor::{to_pointcloud, to_rgbd, Camera};

/// Raw buffers and parameters of every sensor, keyed by camera uid.
#[derive(Debug, Clone, Default)]
pub struct SensorCapture {
    pub data: ObsDict,
    pub params: ObsDict,
}

/// Where the dispatcher pulls its inputs from.
pub trait ObsSource {
    /// `{agent: ..., extra: ...}`, batched.
    fn state_dict(&mut self) -> Result<ObsDict>;

    /// Capture every sensor once.
    fn capture_sensors(&mut self) -> Result<SensorCapture>;
}

/// Build the batched observation for `mode`.
pub fn dispatch(mode: ObsMode, num_envs: usize, source: &mut impl ObsSource) -> Result<ObsValue> {
    match mode {
        ObsMode::None => Ok(ObsValue::empty()),
        ObsMode::StateDict => Ok(ObsValue::Dict(source.state_dict()?)),
        ObsMode::State => {
            let flat = ObsValue::Dict(source.state_dict()?).flatten_batched(num_envs)?;
            Ok(ObsValue::F32(flat))
        }
        ObsMode::SensorData => {
            let mut obs = source.state_dict()?;
            let capture = source.capture_sensors()?;
            obs.insert("sensor_param".into(), ObsValue::Dict(capture.params));
            obs.insert("sensor_data".into(), ObsValue::Dict(capture.data));
            Ok(ObsValue::Dict(obs))
        }
        ObsMode::Rgbd => {
            let mut obs = source.state_dict()?;
            let capture = source.capture_sensors()?;
            let images = to_rgbd(&capture.data)?;
            obs.insert("sensor_param".into(), ObsValue::Dict(capture.params));
            obs.insert("sensor_data".into(), ObsValue::Dict(images));
            Ok(ObsValue::Dict(obs))
        }
        ObsMode::Pointcloud => {
            let mut obs = source.state_dict()?;
            let capture = source.capture_sensors()?;
            let cloud = to_pointcloud(&capture.data, &capture.params)?;
            obs.insert("sensor_param".into(), ObsValue::Dict(capture.params));
            obs.insert("pointcloud".into(), ObsValue::Dict(cloud));
            Ok(ObsValue::Dict(obs))
        }
    }
}

/// Hide `hidden`, push render state, capture each camera, then put each
/// object back to the visibility it had before.
pub fn capture_cameras(
    device: &mut dyn SimDevice,
    scene: &mut Scene,
    cameras: &IndexMap<String, Camera>,
    hidden: &[ObjectId],
) -> Result<SensorCapture> {
    let prior: Vec<(ObjectId, bool)> = hidden
        .iter()
        .map(|&object| (object, scene.is_visible(object)))
        .collect();
    for &object in hidden {
        scene.set_visible(object, false);
    }
    let result = capture_visible(device, scene, cameras);
    for (object, visible) in prior {
        scene.set_visible(object, visible);
    }
    result
}

/// Capture each camera with the scene's current visibility.
pub fn capture_visible(
    device: &mut dyn SimDevice,
    scene: &Scene,
    cameras: &IndexMap<String, Camera>,
) -> Result<SensorCapture> {
    let n = scene.num_envs();
    let backend = device.backend_mut();
    backend.update_render(scene)?;
    let mut capture = SensorCapture::default();
    for (uid, camera) in cameras {
        let frame = backend.capture(camera)?;
        capture.data.insert(uid.clone(), ObsValue::Dict(frame.into_obs()));
        capture.params.insert(uid.clone(), ObsValue::Dict(camera.params(n)));
    }
    Ok(capture)
}
