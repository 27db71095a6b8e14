//! Conjugate parameterization of a naive-Bayes style dynamic network.
//!
//! Supported structures have at most one discrete "class" variable. Its
//! parent set is empty or its own interface variable; every other
//! variable has an empty parent set or the class as its only parent.
//!
//! Parameters minted per variable:
//!
//! * class `C` with `k` states: `Theta_C_Time0 ~ Dirichlet(k)`, and with a
//!   temporal edge, `Theta_C|C_Interface=j ~ Dirichlet(k)` for each `j`
//! * multinomial `X`: `Theta_X|C=c ~ Dirichlet` per class state
//! * normal `X`: `Mu_X|C=c ~ Gaussian` and `Var_X|C=c ~ InverseGamma`
//!
//! Parentless variables get a single unsuffixed parameter set.

use crate::config::PriorConfig;
use crate::expfam;
use crate::natural_params::CompoundVector;

use lentil_vars::*;
use log::info;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::fmt;

/// Parameters of the class chain
#[derive(Debug, Clone)]
pub struct ClassParameters {
    pub var: Variable,
    pub attribute: usize,
    pub num_states: usize,
    /// distribution at time 0 (and at every slice without a temporal edge)
    pub initial: Variable,
    /// one Dirichlet per state of the previous slice
    pub transition: Option<Vec<Variable>>,
}

#[derive(Debug, Clone)]
pub enum EmissionParameters {
    Multinomial {
        num_states: usize,
        theta: Vec<Variable>,
    },
    Normal {
        mean: Vec<Variable>,
        variance: Vec<Variable>,
    },
}

/// An observed variable other than the class
#[derive(Debug, Clone)]
pub struct EmissionNode {
    pub var: Variable,
    pub attribute: usize,
    /// parameters indexed by class state if true; a single set otherwise
    pub conditioned: bool,
    pub params: EmissionParameters,
}

impl EmissionNode {
    /// Which parameter set governs this node under class state `c`
    #[inline]
    pub fn param_index(&self, c: usize) -> usize {
        if self.conditioned {
            c
        } else {
            0
        }
    }
}

#[derive(Debug)]
pub struct ExpFamilyModel {
    dag: DynamicDag,
    parameters: ParameterVariables,
    class: Option<ClassParameters>,
    nodes: Vec<EmissionNode>,
    prior: CompoundVector,
}

impl ExpFamilyModel {
    /// Mint parameter variables for `dag` and block the registry.
    pub fn new(dag: &DynamicDag, priors: &PriorConfig) -> anyhow::Result<Self> {
        let vars = dag.variables().clone();
        let class_var = find_class_variable(dag)?;

        let mut builder = ParameterVariablesBuilder::for_universe(vars.as_ref());
        let mut class = None;
        let mut nodes = vec![];

        let class_states = match &class_var {
            Some(c) => c
                .number_of_states()
                .ok_or_else(|| anyhow::anyhow!("class variable {} must be discrete", c))?,
            None => 1,
        };

        for ps in dag.parent_sets_time_t() {
            let var = ps.main_var();
            let attribute = var
                .attribute_index()
                .ok_or_else(|| anyhow::anyhow!("{} is not backed by an attribute", var))?;

            if Some(var) == class_var.as_ref() {
                let interface = vars.get_interface_variable(var)?;
                for p in ps.parents() {
                    if p != interface {
                        anyhow::bail!("class {} can only depend on {}", var, interface);
                    }
                }
                let initial = builder
                    .new_dirichlet_parameter(&format!("Theta_{}_Time0", var), class_states)?;
                let transition = if ps.contains(interface) {
                    let mut theta = vec![];
                    for j in 0..class_states {
                        theta.push(builder.new_dirichlet_parameter(
                            &format!("Theta_{}|{}={}", var, interface, j),
                            class_states,
                        )?);
                    }
                    Some(theta)
                } else {
                    None
                };
                class = Some(ClassParameters {
                    var: var.clone(),
                    attribute,
                    num_states: class_states,
                    initial,
                    transition,
                });
                continue;
            }

            let conditioned = match (ps.parents(), &class_var) {
                ([], _) => false,
                ([p], Some(c)) if p == c => true,
                _ => anyhow::bail!("unsupported parent set: {}", ps),
            };

            let suffixes: Vec<String> = match (&class_var, conditioned) {
                (Some(c), true) => (0..class_states).map(|k| format!("|{}={}", c, k)).collect(),
                _ => vec![String::new()],
            };

            let params = match var.state_space() {
                StateSpaceType::FiniteSet(num_states) => {
                    let mut theta = vec![];
                    for s in suffixes.iter() {
                        theta.push(
                            builder.new_dirichlet_parameter(&format!("Theta_{}{}", var, s), num_states)?,
                        );
                    }
                    EmissionParameters::Multinomial { num_states, theta }
                }
                StateSpaceType::Real => {
                    let mut mean = vec![];
                    let mut variance = vec![];
                    for s in suffixes.iter() {
                        mean.push(builder.new_gaussian_parameter(&format!("Mu_{}{}", var, s))?);
                        variance.push(
                            builder.new_inverse_gamma_parameter(&format!("Var_{}{}", var, s))?,
                        );
                    }
                    EmissionParameters::Normal { mean, variance }
                }
            };

            nodes.push(EmissionNode {
                var: var.clone(),
                attribute,
                conditioned,
                params,
            });
        }

        // no more parameters beyond this point
        let parameters = builder.block();

        let mut prior = CompoundVector::zeros(&parameters);
        for var in parameters.iter() {
            let block = prior.block_mut(var);
            match var.family() {
                DistributionFamily::Dirichlet(_) => {
                    block.fill(priors.dirichlet_alpha - 1.0);
                }
                DistributionFamily::Gaussian => {
                    block.copy_from_slice(&expfam::gaussian_natural(
                        priors.gaussian_mean,
                        priors.gaussian_variance,
                    ));
                }
                DistributionFamily::InverseGamma => {
                    block.copy_from_slice(&expfam::inverse_gamma_natural(
                        priors.inverse_gamma_shape,
                        priors.inverse_gamma_scale,
                    ));
                }
                other => anyhow::bail!("{:?} is not a parameter family", other),
            }
        }

        info!(
            "{} parameter variables, {} natural parameters",
            parameters.len(),
            prior.dim()
        );

        Ok(Self {
            dag: dag.clone(),
            parameters,
            class,
            nodes,
            prior,
        })
    }

    pub fn dag(&self) -> &DynamicDag {
        &self.dag
    }

    pub fn attributes(&self) -> &Attributes {
        self.dag.variables().attributes()
    }

    pub fn parameters(&self) -> &ParameterVariables {
        &self.parameters
    }

    pub fn class(&self) -> Option<&ClassParameters> {
        self.class.as_ref()
    }

    pub fn nodes(&self) -> &[EmissionNode] {
        &self.nodes
    }

    /// 1 when there is no class variable
    pub fn num_class_states(&self) -> usize {
        self.class.as_ref().map(|c| c.num_states).unwrap_or(1)
    }

    pub fn prior(&self) -> &CompoundVector {
        &self.prior
    }

    pub fn zeros(&self) -> CompoundVector {
        self.prior.zeros_like()
    }

    pub fn check_compatible(&self, posterior: &CompoundVector) -> anyhow::Result<()> {
        if !self.prior.is_compatible(posterior) {
            anyhow::bail!(
                "natural parameter vector does not match the model layout ({} blocks expected, {} given)",
                self.prior.number_of_blocks(),
                posterior.number_of_blocks()
            );
        }
        Ok(())
    }

    /// Prior plus random Dirichlet pseudo-counts and random Normal means,
    /// so latent class states do not start out symmetric.
    pub fn initial_posterior<R: Rng>(&self, rng: &mut R) -> CompoundVector {
        let mut posterior = self.prior.clone();
        for var in self.parameters.iter() {
            let block = posterior.block_mut(var);
            match var.family() {
                DistributionFamily::Dirichlet(_) => {
                    for x in block.iter_mut() {
                        *x += rng.random::<f64>();
                    }
                }
                DistributionFamily::Gaussian => {
                    let m: f64 = StandardNormal.sample(rng);
                    block.copy_from_slice(&expfam::gaussian_natural(m, 1.0));
                }
                _ => {}
            }
        }
        posterior
    }

    /// Expected sufficient statistics of every parameter under `posterior`
    pub fn moments(&self, posterior: &CompoundVector) -> CompoundVector {
        let mut ret = posterior.zeros_like();
        for var in self.parameters.iter() {
            let m = expfam::expected_sufficient_statistics(var.family(), posterior.block(var));
            ret.block_mut(var).copy_from_slice(&m);
        }
        ret
    }

    /// `KL(q || p)` summed over all parameter variables
    pub fn kl_divergence(&self, posterior: &CompoundVector) -> f64 {
        self.parameters
            .iter()
            .map(|var| expfam::kl_divergence(var.family(), posterior.block(var), self.prior.block(var)))
            .sum()
    }

    /// Posterior mean of one parameter variable
    pub fn posterior_mean(&self, posterior: &CompoundVector, var: &Variable) -> Vec<f64> {
        expfam::posterior_mean(var.family(), posterior.block(var))
    }

    /// Check schema and values of one instance
    pub fn check_instance(&self, values: &[f64]) -> anyhow::Result<()> {
        let attributes = self.attributes();
        if values.len() != attributes.len() {
            anyhow::bail!(
                "instance has {} values, schema has {} attributes",
                values.len(),
                attributes.len()
            );
        }
        for (x, a) in values.iter().zip(attributes.iter()) {
            if x.is_nan() {
                continue;
            }
            match a.state_space {
                StateSpaceType::FiniteSet(k) => {
                    if *x < 0.0 || *x >= k as f64 || x.fract() != 0.0 {
                        anyhow::bail!("{} = {} is outside of {} states", a.name, x, k);
                    }
                }
                StateSpaceType::Real => {
                    if !x.is_finite() {
                        anyhow::bail!("{} = {} is not finite", a.name, x);
                    }
                }
            }
        }
        Ok(())
    }

    /// Human-readable posterior means, one line per parameter variable
    pub fn write_posterior<W: fmt::Write>(
        &self,
        out: &mut W,
        posterior: &CompoundVector,
    ) -> fmt::Result {
        writeln!(out, "Dynamic Bayesian Network:")?;
        write!(out, "{}", self.dag)?;
        writeln!(out, "Posterior means:")?;
        for var in self.parameters.iter() {
            let mean = self.posterior_mean(posterior, var);
            let mean: Vec<String> = mean.iter().map(|x| format!("{:.4}", x)).collect();
            writeln!(
                out,
                "{} ~ {:?}: [{}]",
                var.name(),
                var.family(),
                mean.join(", ")
            )?;
        }
        Ok(())
    }
}

/// The single variable that either has children within the slice or
/// depends on its own past
fn find_class_variable(dag: &DynamicDag) -> anyhow::Result<Option<Variable>> {
    let vars = dag.variables();
    let mut hubs: Vec<Variable> = vec![];

    for ps in dag.parent_sets_time_t() {
        for p in ps.parents() {
            let hub = if p.is_interface() {
                let main = vars.get_main_variable(p)?;
                if main != ps.main_var() {
                    anyhow::bail!("unsupported temporal edge {} -> {}", p, ps.main_var());
                }
                main.clone()
            } else {
                p.clone()
            };
            if !hubs.contains(&hub) {
                hubs.push(hub);
            }
        }
    }

    if hubs.len() > 1 {
        let names: Vec<&str> = hubs.iter().map(|v| v.name()).collect();
        anyhow::bail!(
            "only single-class naive-Bayes structures are supported, found hubs {{{}}}",
            names.join(", ")
        );
    }
    Ok(hubs.pop())
}
