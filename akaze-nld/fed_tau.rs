//! Fast Explicit Diffusion step-size schedules.
//!
//! A FED cycle runs n explicit substeps with varying step sizes derived from
//! Chebyshev roots. Individual steps may exceed the explicit stability limit,
//! but the cycle as a whole is stable and reaches the requested diffusion
//! time far faster than uniform explicit stepping.

/// Step sizes covering a total process time `t` split over `m` cycles.
///
/// `tau_max` is the stability bound of a single explicit step (0.25 for the
/// 2D grid used here). With `reordering`, steps are permuted with a
/// prime-strided cycle to interleave unstable and stable steps.
pub fn fed_tau_by_process_time(t: f64, m: usize, tau_max: f64, reordering: bool) -> Vec<f64> {
    fed_tau_by_cycle_time(t / m.max(1) as f64, tau_max, reordering)
}

/// Step sizes for one cycle of duration `t`
pub fn fed_tau_by_cycle_time(t: f64, tau_max: f64, reordering: bool) -> Vec<f64> {
    // Smallest n with n*(n+1)/3 * tau_max >= t
    let n = ((3.0 * t / tau_max + 0.25).sqrt() - 0.5 - 1.0e-8).ceil().max(1.0) as usize;
    let scale = 3.0 * t / (tau_max * (n * (n + 1)) as f64);
    fed_tau_internal(n, scale, tau_max, reordering)
}

fn fed_tau_internal(n: usize, scale: f64, tau_max: f64, reordering: bool) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let c = 1.0 / (4.0 * n as f64 + 2.0);
    let d = scale * tau_max / 2.0;
    let tau_unordered: Vec<f64> = (0..n)
        .map(|k| {
            let h = (std::f64::consts::PI * (2.0 * k as f64 + 1.0) * c).cos();
            d / (h * h)
        })
        .collect();
    if !reordering || n == 1 {
        return tau_unordered;
    }

    // Permute with stride kappa modulo the smallest prime >= n + 1
    let kappa = n / 2;
    let mut prime = n + 1;
    while !is_prime(prime) {
        prime += 1;
    }
    let mut tau = Vec::with_capacity(n);
    let mut k = 0usize;
    for _ in 0..n {
        let mut index = ((k + 1) * kappa) % prime - 1;
        while index >= n {
            k += 1;
            index = ((k + 1) * kappa) % prime - 1;
        }
        tau.push(tau_unordered[index]);
        k += 1;
    }
    tau
}

fn is_prime(number: usize) -> bool {
    match number {
        0 | 1 => false,
        2 | 3 | 5 | 7 => true,
        _ if number % 2 == 0 => false,
        _ => {
            let mut divisor = 3;
            while divisor * divisor <= number {
                if number % divisor == 0 {
                    return false;
                }
                divisor += 2;
            }
            true
        }
    }
}
