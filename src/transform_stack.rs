use cgmath::{Matrix4, SquareMatrix};

/// Stack of composed 4x4 transforms used while walking the scene.
///
/// The bottom entry is the frame established before traversal starts (the
/// camera orbit and view transform), so it can never be popped.
#[derive(Debug, Clone)]
pub struct TransformStack {
    stack: Vec<Matrix4<f32>>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self {
            stack: vec![Matrix4::identity()],
        }
    }

    /// The current composed transform
    pub fn top(&self) -> Matrix4<f32> {
        // Never empty: `pop` refuses to remove the base entry
        self.stack[self.stack.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Duplicate the top entry so later multiplies can be undone with `pop`
    pub fn push(&mut self) {
        let top = self.top();
        self.stack.push(top);
    }

    /// Discard the top entry, restoring the previously composed transform.
    ///
    /// # Panics
    ///
    /// Panics when only the base entry is left. An unbalanced pop is a bug in
    /// the traversal and would otherwise leak transforms into sibling draws.
    pub fn pop(&mut self) {
        assert!(
            self.stack.len() > 1,
            "TransformStack::pop called without a matching push"
        );
        self.stack.pop();
    }

    /// Replace the top entry with `top * matrix`
    pub fn multiply(&mut self, matrix: Matrix4<f32>) {
        let last = self.stack.len() - 1;
        self.stack[last] = self.stack[last] * matrix;
    }

    /// Run `f` between a push and its matching pop.
    ///
    /// The pop happens on every way out of `f`, including early returns
    /// through `?` inside the closure.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.depth();
        self.push();
        let result = f(self);
        debug_assert_eq!(
            self.depth(),
            depth + 1,
            "unbalanced push/pop inside TransformStack::scoped"
        );
        self.pop();
        result
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Vector3};

    fn assert_matrix_eq(a: Matrix4<f32>, b: Matrix4<f32>) {
        let a: [[f32; 4]; 4] = a.into();
        let b: [[f32; 4]; 4] = b.into();
        for c in 0..4 {
            for r in 0..4 {
                assert!(
                    (a[c][r] - b[c][r]).abs() < 1e-5,
                    "matrices differ at [{}][{}]: {} vs {}",
                    c,
                    r,
                    a[c][r],
                    b[c][r]
                );
            }
        }
    }

    #[test]
    fn starts_with_identity() {
        let stack = TransformStack::new();
        assert_eq!(stack.depth(), 1);
        assert_matrix_eq(stack.top(), Matrix4::identity());
    }

    #[test]
    fn multiply_post_multiplies_top() {
        let mut stack = TransformStack::new();
        let t = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let s = Matrix4::from_scale(2.0);
        stack.multiply(t);
        stack.multiply(s);
        assert_matrix_eq(stack.top(), t * s);
    }

    #[test]
    fn balanced_sequence_restores_top() {
        let mut stack = TransformStack::new();
        stack.multiply(Matrix4::from_angle_y(Deg(30.0)));
        let before = stack.top();

        stack.push();
        stack.multiply(Matrix4::from_translation(Vector3::new(4.0, 0.0, -1.0)));
        stack.push();
        stack.multiply(Matrix4::from_scale(3.0));
        stack.pop();
        stack.multiply(Matrix4::from_angle_x(Deg(45.0)));
        stack.pop();

        assert_eq!(stack.depth(), 1);
        assert_matrix_eq(stack.top(), before);
    }

    #[test]
    fn scoped_pops_on_early_exit() {
        let mut stack = TransformStack::new();
        let checked_scale = |factor: f32| -> Result<f32, &'static str> {
            if factor > 6.0 {
                Err("too large")
            } else {
                Ok(factor)
            }
        };
        let result: Result<(), &str> = stack.scoped(|stack| {
            stack.multiply(Matrix4::from_scale(checked_scale(5.0)?));
            stack.multiply(Matrix4::from_scale(checked_scale(7.0)?));
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(stack.depth(), 1);
        assert_matrix_eq(stack.top(), Matrix4::identity());
    }

    #[test]
    #[should_panic(expected = "without a matching push")]
    fn popping_base_entry_panics() {
        let mut stack = TransformStack::new();
        stack.pop();
    }
}
