use glam::Vec3;

/// A 4x4 transform matrix: 16 contiguous floats, row-major storage, acting on
/// column vectors (`M * [x, y, z, 1]`).
///
/// Every mutating operation post-multiplies (`m = m * op`), so a sequence of
/// calls applies right-to-left to points. The drawable pipeline relies on the
/// fixed order translate ∘ rotate ∘ scale ∘ translate(-origin): the origin
/// acts as the pivot for rotation and scaling before final placement. The
/// storage convention matches what the default shaders expect; see
/// [`crate::render::shader`].
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    content: [f32; 16],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    /// The identity matrix.
    #[must_use]
    pub fn identity() -> Self {
        let mut content = [0.0; 16];
        content[0] = 1.0;
        content[5] = 1.0;
        content[10] = 1.0;
        content[15] = 1.0;
        Self { content }
    }

    /// Resets the receiver to the identity.
    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    /// Returns the element at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.content[row * 4 + col]
    }

    /// Sets the element at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.content[row * 4 + col] = value;
    }

    /// The 16 floats in storage order.
    #[must_use]
    pub fn as_array(&self) -> &[f32; 16] {
        &self.content
    }

    /// Copies the 16 floats of `other` into the receiver.
    pub fn copy_from(&mut self, other: &Matrix) {
        self.content = other.content;
    }

    /// Post-multiplies the receiver by a translation.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        let mut op = Self::identity();
        op.set(0, 3, x);
        op.set(1, 3, y);
        op.set(2, 3, z);
        self.multiply_by(&op);
    }

    /// Post-multiplies the receiver by a scale.
    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        let mut op = Self::identity();
        op.set(0, 0, x);
        op.set(1, 1, y);
        op.set(2, 2, z);
        self.multiply_by(&op);
    }

    /// Post-multiplies the receiver by a rotation of `degrees` around the
    /// axis `(x, y, z)`. The axis does not need to be normalized; a zero axis
    /// leaves the receiver unchanged.
    pub fn rotate(&mut self, degrees: f32, x: f32, y: f32, z: f32) {
        let len = (x * x + y * y + z * z).sqrt();
        if len == 0.0 {
            return;
        }
        let (x, y, z) = (x / len, y / len, z / len);

        let angle = degrees.to_radians();
        let c = angle.cos();
        let s = angle.sin();
        let t = 1.0 - c;

        let mut op = Self::identity();
        op.set(0, 0, t * x * x + c);
        op.set(0, 1, t * x * y - s * z);
        op.set(0, 2, t * x * z + s * y);
        op.set(1, 0, t * x * y + s * z);
        op.set(1, 1, t * y * y + c);
        op.set(1, 2, t * y * z - s * x);
        op.set(2, 0, t * x * z - s * y);
        op.set(2, 1, t * y * z + s * x);
        op.set(2, 2, t * z * z + c);
        self.multiply_by(&op);
    }

    /// Replaces the receiver with an orthographic projection mapping
    /// `[left, right] x [bottom, top]` to clip space, with the z range fixed
    /// to `[-1, 1]`.
    pub fn set_ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32) {
        self.reset();
        self.set(0, 0, 2.0 / (right - left));
        self.set(0, 3, -(right + left) / (right - left));
        self.set(1, 1, 2.0 / (top - bottom));
        self.set(1, 3, -(top + bottom) / (top - bottom));
        self.set(2, 2, -1.0);
    }

    /// Applies the receiver to a point (w = 1).
    #[must_use]
    pub fn transform(&self, point: Vec3) -> Vec3 {
        let m = &self.content;
        Vec3::new(
            m[0] * point.x + m[1] * point.y + m[2] * point.z + m[3],
            m[4] * point.x + m[5] * point.y + m[6] * point.z + m[7],
            m[8] * point.x + m[9] * point.y + m[10] * point.z + m[11],
        )
    }

    fn multiply_by(&mut self, rhs: &Matrix) {
        let a = self.content;
        let b = &rhs.content;
        let mut out = [0.0f32; 16];
        for row in 0..4 {
            for col in 0..4 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += a[row * 4 + k] * b[k * 4 + col];
                }
                out[row * 4 + col] = acc;
            }
        }
        self.content = out;
    }
}

impl From<[f32; 16]> for Matrix {
    fn from(content: [f32; 16]) -> Self {
        Self { content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn post_multiplication_applies_right_to_left() {
        // translate then scale: scale happens first on the point
        let mut m = Matrix::identity();
        m.translate(10.0, 0.0, 0.0);
        m.scale(2.0, 2.0, 1.0);
        assert!(approx(
            m.transform(Vec3::new(1.0, 1.0, 0.0)),
            Vec3::new(12.0, 2.0, 0.0)
        ));
    }

    #[test]
    fn zero_axis_rotation_is_noop() {
        let mut m = Matrix::identity();
        m.rotate(45.0, 0.0, 0.0, 0.0);
        assert_eq!(m, Matrix::identity());
    }
}
