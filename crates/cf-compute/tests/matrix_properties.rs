//! Property tests for the CPU matrix primitives.

use cf_compute::CpuBackend;
use cf_core::{LinalgBackend, MultiplyConfig, Transpose};
use proptest::prelude::*;

fn identity(n: usize) -> Vec<f32> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        out[i * n + i] = 1.0;
    }
    out
}

fn matrix(max_dim: usize) -> impl Strategy<Value = (usize, usize, Vec<f32>)> {
    (1..=max_dim, 1..=max_dim).prop_flat_map(|(m, n)| {
        (Just(m), Just(n), prop::collection::vec(-100.0f32..100.0, m * n))
    })
}

proptest! {
    #[test]
    fn transpose_twice_is_identity((m, n, a) in matrix(40)) {
        let backend = CpuBackend::new();
        let mut t = vec![0.0; m * n];
        backend.transpose(&a, &mut t, m, n).unwrap();
        let mut back = vec![0.0; m * n];
        backend.transpose(&t, &mut back, n, m).unwrap();
        prop_assert_eq!(back, a);
    }

    #[test]
    fn transpose_in_place_twice_is_identity((m, n, a) in matrix(40)) {
        let backend = CpuBackend::new();
        let mut buf = a.clone();
        backend.transpose_in_place(&mut buf, m, n).unwrap();
        backend.transpose_in_place(&mut buf, n, m).unwrap();
        prop_assert_eq!(buf, a);
    }

    #[test]
    fn identity_multiply_reproduces_operand(
        (m, n, a) in matrix(12),
        ta in any::<bool>(),
        tb in any::<bool>(),
    ) {
        let backend = CpuBackend::new();
        // A stored m x n; use it as the left operand with an identity on the right.
        let (rows, cols) = if ta { (n, m) } else { (m, n) };
        let eye = identity(cols);
        let mut c = vec![f32::NAN; rows * cols];
        let cfg = MultiplyConfig::new(rows, cols, cols)
            .with_transpose(Transpose::from(ta), Transpose::from(tb));
        backend.multiply(&a, &eye, &mut c, &cfg).unwrap();

        let mut expected = a.clone();
        if ta {
            backend.transpose(&a, &mut expected, m, n).unwrap();
        }
        prop_assert_eq!(c, expected.clone());

        // Identity on the left reproduces the right operand.
        let eye = identity(rows);
        let b = if tb {
            let mut bt = vec![0.0; rows * cols];
            backend.transpose(&expected, &mut bt, rows, cols).unwrap();
            bt
        } else {
            expected.clone()
        };
        let mut c = vec![f32::NAN; rows * cols];
        let cfg = MultiplyConfig::new(rows, rows, cols)
            .with_transpose(Transpose::from(ta), Transpose::from(tb));
        backend.multiply(&eye, &b, &mut c, &cfg).unwrap();
        prop_assert_eq!(c, expected);
    }

    #[test]
    fn unit_diagonal_is_identity((m, n, b) in matrix(30)) {
        let backend = CpuBackend::new();
        let ones = vec![1.0; m];
        let mut c = vec![f32::NAN; m * n];
        backend.multiply_diagonal(&ones, &b, &mut c, m, n).unwrap();
        prop_assert_eq!(c, b);
    }
}
