//! Deterministic transforms from raw camera buffers to RGB-D images and
//! fused world-frame point clouds.

use ndarray::{concatenate, s, Array3, ArrayD, Axis, Ix3, Ix4};
use simbatch_core::{ObsDict, ObsValue, Result, SimError};

use super::{COLOR, POSITION, SEGMENTATION};

fn camera_buffers<'a>(uid: &str, value: &'a ObsValue) -> Result<&'a ObsDict> {
    value.as_dict().ok_or_else(|| {
        SimError::contract("sensor transform", format!("sensor '{}' is not a buffer dict", uid))
    })
}

fn leaf<'a, T>(
    uid: &str,
    buffers: &'a ObsDict,
    key: &str,
    get: impl Fn(&ObsValue) -> Option<&ArrayD<T>>,
) -> Result<&'a ArrayD<T>> {
    buffers.get(key).and_then(|v| get(v)).ok_or_else(|| {
        SimError::contract(
            "sensor transform",
            format!("sensor '{}' has no '{}' buffer of the expected type", uid, key),
        )
    })
}

/// Replace raw buffers with `rgb` (N,H,W,3), `depth` (N,H,W,1, metres) and
/// `segmentation` per camera.
pub fn to_rgbd(sensor_data: &ObsDict) -> Result<ObsDict> {
    let mut out = ObsDict::new();
    for (uid, value) in sensor_data {
        let buffers = camera_buffers(uid, value)?;
        let color = leaf(uid, buffers, COLOR, ObsValue::as_u8)?
            .view()
            .into_dimensionality::<Ix4>()?;
        let position = leaf(uid, buffers, POSITION, ObsValue::as_f32)?
            .view()
            .into_dimensionality::<Ix4>()?;
        let segmentation = leaf(uid, buffers, SEGMENTATION, ObsValue::as_i32)?;

        let rgb = color.slice(s![.., .., .., 0..3]).to_owned();
        let depth = position.slice(s![.., .., .., 2..3]).mapv(|z| -z);

        let mut cam = ObsDict::new();
        cam.insert("rgb".into(), ObsValue::U8(rgb.into_dyn()));
        cam.insert("depth".into(), ObsValue::F32(depth.into_dyn()));
        cam.insert("segmentation".into(), ObsValue::I32(segmentation.clone()));
        out.insert(uid.clone(), ObsValue::Dict(cam));
    }
    Ok(out)
}

/// Fuse every camera into one world-frame point cloud.
///
/// Returns `{xyzw (N,P,4), rgb (N,P,3), segmentation (N,P,1)}` where `P` is
/// the total pixel count over all cameras. `w` is 1 for pixels that hit
/// geometry and 0 otherwise.
pub fn to_pointcloud(sensor_data: &ObsDict, sensor_param: &ObsDict) -> Result<ObsDict> {
    let mut xyzw_parts: Vec<Array3<f32>> = Vec::new();
    let mut rgb_parts: Vec<Array3<u8>> = Vec::new();
    let mut seg_parts: Vec<Array3<i32>> = Vec::new();

    for (uid, value) in sensor_data {
        let buffers = camera_buffers(uid, value)?;
        let params = sensor_param
            .get(uid)
            .map(|p| camera_buffers(uid, p))
            .transpose()?
            .ok_or_else(|| {
                SimError::contract("sensor transform", format!("no parameters for sensor '{}'", uid))
            })?;
        let color = leaf(uid, buffers, COLOR, ObsValue::as_u8)?
            .view()
            .into_dimensionality::<Ix4>()?;
        let position = leaf(uid, buffers, POSITION, ObsValue::as_f32)?
            .view()
            .into_dimensionality::<Ix4>()?;
        let segmentation = leaf(uid, buffers, SEGMENTATION, ObsValue::as_i32)?
            .view()
            .into_dimensionality::<Ix4>()?;
        let cam2world = leaf(uid, params, "cam2world_gl", ObsValue::as_f32)?
            .view()
            .into_dimensionality::<Ix3>()?;

        let (n, h, w, _) = position.dim();
        let pixels = h * w;
        let mut xyzw = Array3::<f32>::zeros((n, pixels, 4));
        for env in 0..n {
            let m = cam2world.index_axis(Axis(0), env);
            for (i, p) in position
                .index_axis(Axis(0), env)
                .to_shape((pixels, 3))?
                .outer_iter()
                .enumerate()
            {
                let (x, y, z) = (p[0], p[1], p[2]);
                for r in 0..3 {
                    xyzw[[env, i, r]] = m[[r, 0]] * x + m[[r, 1]] * y + m[[r, 2]] * z + m[[r, 3]];
                }
                xyzw[[env, i, 3]] = if z < 0.0 { 1.0 } else { 0.0 };
            }
        }

        xyzw_parts.push(xyzw);
        rgb_parts.push(
            color
                .slice(s![.., .., .., 0..3])
                .to_shape((n, pixels, 3))?
                .into_owned(),
        );
        seg_parts.push(segmentation.to_shape((n, pixels, 1))?.into_owned());
    }

    fn fuse<A: Clone>(parts: &[Array3<A>]) -> Result<ArrayD<A>> {
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        Ok(concatenate(Axis(1), &views)?.into_dyn())
    }

    let mut cloud = ObsDict::new();
    if xyzw_parts.is_empty() {
        return Ok(cloud);
    }
    cloud.insert("xyzw".into(), ObsValue::F32(fuse(&xyzw_parts)?));
    cloud.insert("rgb".into(), ObsValue::U8(fuse(&rgb_parts)?));
    cloud.insert("segmentation".into(), ObsValue::I32(fuse(&seg_parts)?));
    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Camera, CameraConfig, CameraFrame};

    fn frame() -> CameraFrame {
        let mut frame = CameraFrame::blank(2, 2, 2);
        frame.color[[0, 0, 0, 0]] = 255;
        frame.position[[0, 0, 0, 2]] = -1.5;
        frame.position[[1, 1, 1, 0]] = 0.5;
        frame.position[[1, 1, 1, 2]] = -2.0;
        frame.segmentation[[1, 1, 1, 0]] = 3;
        frame
    }

    fn data() -> (ObsDict, ObsDict) {
        let cam = Camera::new(CameraConfig::new("base", 2, 2).with_look_at([0.0, 0.0, 1.0], [1.0, 0.0, 1.0]));
        let mut sensor_data = ObsDict::new();
        sensor_data.insert("base".into(), ObsValue::Dict(frame().into_obs()));
        let mut params = ObsDict::new();
        params.insert("base".into(), ObsValue::Dict(cam.params(2)));
        (sensor_data, params)
    }

    #[test]
    fn test_rgbd_depth_is_positive_metres() {
        let (sensor_data, _) = data();
        let rgbd = to_rgbd(&sensor_data).unwrap();
        let depth = rgbd["base"].get_path("depth").unwrap().as_f32().unwrap();
        assert_eq!(depth.shape(), &[2, 2, 2, 1]);
        assert_eq!(depth[[0, 0, 0, 0]], 1.5);
        assert_eq!(depth[[1, 1, 1, 0]], 2.0);
        let rgb = rgbd["base"].get_path("rgb").unwrap().as_u8().unwrap();
        assert_eq!(rgb.shape(), &[2, 2, 2, 3]);
        assert_eq!(rgb[[0, 0, 0, 0]], 255);
    }

    #[test]
    fn test_pointcloud_marks_hits_and_transforms_to_world() {
        let (sensor_data, params) = data();
        let cloud = to_pointcloud(&sensor_data, &params).unwrap();
        let xyzw = cloud["xyzw"].as_f32().unwrap();
        assert_eq!(xyzw.shape(), &[2, 4, 4]);
        // env 0, pixel 0: 1.5 m straight ahead of a camera at z=1 looking along +x
        assert_eq!(xyzw[[0, 0, 3]], 1.0);
        assert!((xyzw[[0, 0, 0]] - 1.5).abs() < 1e-5);
        assert!((xyzw[[0, 0, 2]] - 1.0).abs() < 1e-5);
        // background pixel
        assert_eq!(xyzw[[0, 1, 3]], 0.0);
        let seg = cloud["segmentation"].as_i32().unwrap();
        assert_eq!(seg[[1, 3, 0]], 3);
    }

    #[test]
    fn test_pointcloud_requires_params() {
        let (sensor_data, _) = data();
        assert!(to_pointcloud(&sensor_data, &ObsDict::new()).is_err());
    }
}
