//! Conjugate exponential-family distributions over model parameters.
//!
//! # Natural parameterization
//!
//! ```text
//! Dirichlet(α)      t(θ)  = log θ            η = α - 1
//! Normal(m, v)      t(μ)  = (μ, μ²)          η = (m/v, -1/(2v))
//! InvGamma(a, b)    t(σ²) = (log σ², 1/σ²)   η = (-a-1, -b)
//! ```
//!
//! With conjugate likelihoods, a posterior is the prior η plus the sum
//! of expected sufficient-statistic messages from the data.

use lentil_vars::DistributionFamily;
use special::Gamma as SpecialGamma;

/// Dirichlet concentration from natural parameters
#[inline]
pub fn dirichlet_alpha(eta: &[f64]) -> Vec<f64> {
    eta.iter().map(|&e| e + 1.0).collect()
}

/// Normal (mean, variance) from natural parameters
#[inline]
pub fn gaussian_mean_variance(eta: &[f64]) -> (f64, f64) {
    let v = -0.5 / eta[1];
    (eta[0] * v, v)
}

/// Natural parameters of Normal(mean, variance)
#[inline]
pub fn gaussian_natural(mean: f64, variance: f64) -> [f64; 2] {
    [mean / variance, -0.5 / variance]
}

/// Inverse-gamma (shape, scale) from natural parameters
#[inline]
pub fn inverse_gamma_shape_scale(eta: &[f64]) -> (f64, f64) {
    (-eta[0] - 1.0, -eta[1])
}

/// Natural parameters of InvGamma(shape, scale)
#[inline]
pub fn inverse_gamma_natural(shape: f64, scale: f64) -> [f64; 2] {
    [-shape - 1.0, -scale]
}

/// Expected sufficient statistics `E[t]` (moment parameters)
pub fn expected_sufficient_statistics(family: DistributionFamily, eta: &[f64]) -> Vec<f64> {
    match family {
        DistributionFamily::Dirichlet(_) | DistributionFamily::Multinomial => {
            let alpha = dirichlet_alpha(eta);
            let psi_tot = alpha.iter().sum::<f64>().digamma();
            alpha.iter().map(|a| a.digamma() - psi_tot).collect()
        }
        DistributionFamily::Gaussian | DistributionFamily::Normal => {
            let (m, v) = gaussian_mean_variance(eta);
            vec![m, m * m + v]
        }
        DistributionFamily::InverseGamma => {
            let (a, b) = inverse_gamma_shape_scale(eta);
            vec![b.ln() - a.digamma(), a / b]
        }
    }
}

/// Log partition function `A(η)`
pub fn log_normalizer(family: DistributionFamily, eta: &[f64]) -> f64 {
    match family {
        DistributionFamily::Dirichlet(_) | DistributionFamily::Multinomial => {
            let alpha = dirichlet_alpha(eta);
            let tot: f64 = alpha.iter().sum();
            alpha.iter().map(|&a| SpecialGamma::ln_gamma(a).0).sum::<f64>()
                - SpecialGamma::ln_gamma(tot).0
        }
        DistributionFamily::Gaussian | DistributionFamily::Normal => {
            -eta[0] * eta[0] / (4.0 * eta[1]) - 0.5 * (-2.0 * eta[1]).ln()
        }
        DistributionFamily::InverseGamma => {
            let (a, b) = inverse_gamma_shape_scale(eta);
            SpecialGamma::ln_gamma(a).0 - a * b.ln()
        }
    }
}

/// `KL(q || p)` for two members of the same family:
/// `(η_q - η_p)·E_q[t] - A(η_q) + A(η_p)`
pub fn kl_divergence(family: DistributionFamily, eta_q: &[f64], eta_p: &[f64]) -> f64 {
    let moments = expected_sufficient_statistics(family, eta_q);
    let cross: f64 = eta_q
        .iter()
        .zip(eta_p.iter())
        .zip(moments.iter())
        .map(|((q, p), t)| (q - p) * t)
        .sum();
    cross - log_normalizer(family, eta_q) + log_normalizer(family, eta_p)
}

/// Posterior mean of the parameter
pub fn posterior_mean(family: DistributionFamily, eta: &[f64]) -> Vec<f64> {
    match family {
        DistributionFamily::Dirichlet(_) | DistributionFamily::Multinomial => {
            let alpha = dirichlet_alpha(eta);
            let tot: f64 = alpha.iter().sum();
            alpha.iter().map(|a| a / tot).collect()
        }
        DistributionFamily::Gaussian | DistributionFamily::Normal => {
            vec![gaussian_mean_variance(eta).0]
        }
        DistributionFamily::InverseGamma => {
            let (a, b) = inverse_gamma_shape_scale(eta);
            if a > 1.0 {
                vec![b / (a - 1.0)]
            } else {
                // mean undefined; fall back to the mode
                vec![b / (a + 1.0)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kl_to_itself_is_zero() {
        let dir = [0.5, 2.0, 1.0];
        let gau = gaussian_natural(1.5, 0.3);
        let ig = inverse_gamma_natural(3.0, 2.0);

        assert!(kl_divergence(DistributionFamily::Dirichlet(3), &dir, &dir).abs() < 1e-12);
        assert!(kl_divergence(DistributionFamily::Gaussian, &gau, &gau).abs() < 1e-12);
        assert!(kl_divergence(DistributionFamily::InverseGamma, &ig, &ig).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_kl_closed_form() {
        // KL(N(m1,v1) || N(m0,v0)) = 0.5 * (ln(v0/v1) + (v1 + (m1-m0)^2)/v0 - 1)
        let (m1, v1, m0, v0): (f64, f64, f64, f64) = (1.0, 0.5, -0.5, 2.0);
        let expected = 0.5 * ((v0 / v1).ln() + (v1 + (m1 - m0) * (m1 - m0)) / v0 - 1.0);
        let kl = kl_divergence(
            DistributionFamily::Gaussian,
            &gaussian_natural(m1, v1),
            &gaussian_natural(m0, v0),
        );
        assert!((kl - expected).abs() < 1e-10, "kl={}, expected={}", kl, expected);
    }

    #[test]
    fn test_log_normalizer() {
        // uniform Dirichlet(1, 1, 1): ln 1 + ln 1 + ln 1 - ln Γ(3)
        let a = log_normalizer(DistributionFamily::Dirichlet(3), &[0.0, 0.0, 0.0]);
        assert!((a + 2.0_f64.ln()).abs() < 1e-12);

        // InvGamma(3, 2): ln Γ(3) - 3 ln 2
        let a = log_normalizer(
            DistributionFamily::InverseGamma,
            &inverse_gamma_natural(3.0, 2.0),
        );
        assert!((a + 2.0 * 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_kl_is_positive() {
        let kl = kl_divergence(
            DistributionFamily::InverseGamma,
            &inverse_gamma_natural(5.0, 3.0),
            &inverse_gamma_natural(1.0, 1.0),
        );
        assert!(kl > 0.0);

        let kl = kl_divergence(DistributionFamily::Dirichlet(2), &[9.0, 1.0], &[0.0, 0.0]);
        assert!(kl > 0.0);
    }

    #[test]
    fn test_moments() {
        // uniform Dirichlet(1,1): E[log θ] = ψ(1) - ψ(2) = -1
        let m = expected_sufficient_statistics(DistributionFamily::Dirichlet(2), &[0.0, 0.0]);
        assert!((m[0] + 1.0).abs() < 1e-10);

        let m = expected_sufficient_statistics(
            DistributionFamily::InverseGamma,
            &inverse_gamma_natural(2.0, 4.0),
        );
        assert!((m[1] - 0.5).abs() < 1e-12);

        let m =
            expected_sufficient_statistics(DistributionFamily::Gaussian, &gaussian_natural(2.0, 1.0));
        assert!((m[0] - 2.0).abs() < 1e-12);
        assert!((m[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_posterior_mean() {
        let mean = posterior_mean(DistributionFamily::Dirichlet(2), &[2.0, 0.0]);
        assert!((mean[0] - 0.75).abs() < 1e-12);
        let mean = posterior_mean(
            DistributionFamily::InverseGamma,
            &inverse_gamma_natural(3.0, 4.0),
        );
        assert!((mean[0] - 2.0).abs() < 1e-12);
    }
}
