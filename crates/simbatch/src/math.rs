//! Rigid-body math: quaternions, poses and camera matrices.
//!
//! Quaternion format is `[w, x, y, z]`. Matrices are row-major,
//! `m[row][col]`.

/// 3-vector.
pub type Vec3 = [f32; 3];
/// Quaternion `[w, x, y, z]`.
pub type Quat = [f32; 4];
/// Row-major 4x4 matrix.
pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY_QUAT: Quat = [1.0, 0.0, 0.0, 0.0];

pub const IDENTITY_MAT4: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

// ============================================================================
// Vectors
// ============================================================================

#[inline]
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn scale(a: Vec3, s: f32) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: Vec3) -> f32 {
    dot(a, a).sqrt()
}

/// Normalize, falling back to +z for degenerate input.
#[inline]
pub fn normalize(v: Vec3) -> Vec3 {
    let len = norm(v);
    if len < 1e-10 {
        return [0.0, 0.0, 1.0];
    }
    scale(v, 1.0 / len)
}

// ============================================================================
// Quaternions
// ============================================================================

/// Normalize a quaternion to unit length.
#[inline]
pub fn quat_normalize(q: Quat) -> Quat {
    let n = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if n < 1e-10 {
        return IDENTITY_QUAT;
    }
    let inv = 1.0 / n;
    [q[0] * inv, q[1] * inv, q[2] * inv, q[3] * inv]
}

/// Hamilton product `q1 * q2`.
#[inline]
pub fn quat_mul(q1: Quat, q2: Quat) -> Quat {
    let (w1, x1, y1, z1) = (q1[0], q1[1], q1[2], q1[3]);
    let (w2, x2, y2, z2) = (q2[0], q2[1], q2[2], q2[3]);
    [
        w1 * w2 - x1 * x2 - y1 * y2 - z1 * z2,
        w1 * x2 + x1 * w2 + y1 * z2 - z1 * y2,
        w1 * y2 - x1 * z2 + y1 * w2 + z1 * x2,
        w1 * z2 + x1 * y2 - y1 * x2 + z1 * w2,
    ]
}

/// Integrate orientation with a world-frame angular velocity over `dt`.
#[inline]
pub fn quat_integrate(q: Quat, omega: Vec3, dt: f32) -> Quat {
    let w = norm(omega);
    if w < 1e-10 {
        return q;
    }
    let half = w * dt * 0.5;
    let s = half.sin() / w;
    let dq = [half.cos(), s * omega[0], s * omega[1], s * omega[2]];
    quat_normalize(quat_mul(dq, q))
}

/// Rotation about the world z axis.
pub fn quat_from_yaw(yaw: f32) -> Quat {
    let h = yaw * 0.5;
    [h.cos(), 0.0, 0.0, h.sin()]
}

/// 3x3 rotation matrix of a unit quaternion, row-major.
#[inline]
pub fn quat_to_rotation_matrix(q: Quat) -> [[f32; 3]; 3] {
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    [
        [1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy)],
        [2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx)],
        [2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy)],
    ]
}

/// Rotate a vector by a unit quaternion.
#[inline]
pub fn quat_rotate_vec(q: Quat, v: Vec3) -> Vec3 {
    let r = quat_to_rotation_matrix(q);
    [dot(r[0], v), dot(r[1], v), dot(r[2], v)]
}

// ============================================================================
// Poses
// ============================================================================

/// Rigid transform: position plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pose {
    pub p: Vec3,
    pub q: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            p: [0.0; 3],
            q: IDENTITY_QUAT,
        }
    }

    pub fn from_position(p: Vec3) -> Self {
        Self {
            p,
            q: IDENTITY_QUAT,
        }
    }

    pub fn new(p: Vec3, q: Quat) -> Self {
        Self { p, q }
    }

    /// Homogeneous transform matrix of this pose.
    pub fn to_matrix(&self) -> Mat4 {
        let r = quat_to_rotation_matrix(self.q);
        [
            [r[0][0], r[0][1], r[0][2], self.p[0]],
            [r[1][0], r[1][1], r[1][2], self.p[1]],
            [r[2][0], r[2][1], r[2][2], self.p[2]],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

// ============================================================================
// Matrices
// ============================================================================

pub fn mat4_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Inverse of a rigid transform (rotation + translation).
pub fn rigid_inverse(m: &Mat4) -> Mat4 {
    let mut out = IDENTITY_MAT4;
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = m[j][i];
        }
    }
    for i in 0..3 {
        out[i][3] = -(0..3).map(|k| out[i][k] * m[k][3]).sum::<f32>();
    }
    out
}

/// Apply a homogeneous transform to a point.
#[inline]
pub fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    [
        m[0][0] * p[0] + m[0][1] * p[1] + m[0][2] * p[2] + m[0][3],
        m[1][0] * p[0] + m[1][1] * p[1] + m[1][2] * p[2] + m[1][3],
        m[2][0] * p[0] + m[2][1] * p[1] + m[2][2] * p[2] + m[2][3],
    ]
}

/// Camera-to-world matrix in OpenGL convention (+x right, +y up, -z forward)
/// for a camera at `eye` looking at `target`.
pub fn look_at_gl(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = normalize(sub(target, eye));
    let r = normalize(cross(f, up));
    let u = cross(r, f);
    [
        [r[0], u[0], -f[0], eye[0]],
        [r[1], u[1], -f[1], eye[1]],
        [r[2], u[2], -f[2], eye[2]],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Flip from OpenGL to OpenCV camera axes (+y down, +z forward).
pub fn gl_to_cv(cam2world_gl: &Mat4) -> Mat4 {
    let flip = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, -1.0, 0.0, 0.0],
        [0.0, 0.0, -1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    mat4_mul(cam2world_gl, &flip)
}
