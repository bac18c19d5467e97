//! Donor-cell upwind advection on the staggered column grid
//!
//! Transported scalars live on cell centers; velocities live on cell
//! faces (one more entry than cells). Fluxes through the bottom and top
//! faces are zero, so with a forcing that vanishes at the domain ends the
//! scheme conserves the column integral of every advected scalar exactly.

/// Advance one scalar field by one advection step.
///
/// `face_velocity` must have `field.len() + 1` entries; `dt` and `dz` are
/// in seconds and metres. The CFL number `|w| dt / dz` must not exceed one
/// anywhere (checked in debug builds).
pub fn donor_cell_step(field: &mut [f64], face_velocity: &[f64], dt: f64, dz: f64) {
    let n = field.len();
    assert_eq!(
        face_velocity.len(),
        n + 1,
        "face velocity must be staggered: {} cells need {} faces",
        n,
        n + 1
    );
    debug_assert!(
        face_velocity.iter().all(|w| (w * dt / dz).abs() <= 1.0),
        "CFL violation: |w| dt/dz exceeds 1"
    );

    // Upwind flux through each interior face; boundary faces carry none.
    let mut flux = vec![0.0; n + 1];
    for j in 1..n {
        let w = face_velocity[j];
        flux[j] = if w >= 0.0 { w * field[j - 1] } else { w * field[j] };
    }

    for j in 0..n {
        field[j] -= dt / dz * (flux[j + 1] - flux[j]);
    }
}
