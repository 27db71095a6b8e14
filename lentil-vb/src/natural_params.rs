//! Natural parameters of all parameter variables of a model.
//!
//! One sub-vector per parameter variable, laid out in registry order.
//! Addition and scaling act block by block, so partial sums computed on
//! separate data partitions can be merged in any order.

use lentil_vars::{ParameterLookup, ParameterVariables, Variable};
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundVector {
    base_index: usize,
    blocks: Vec<Vec<f64>>,
}

impl CompoundVector {
    /// All-zero vector shaped after the registry
    pub fn zeros(parameters: &ParameterVariables) -> Self {
        Self {
            base_index: parameters.base_index(),
            blocks: parameters
                .iter()
                .map(|v| vec![0.0; v.sufficient_statistic_dim()])
                .collect(),
        }
    }

    pub fn zeros_like(&self) -> Self {
        Self {
            base_index: self.base_index,
            blocks: self.blocks.iter().map(|b| vec![0.0; b.len()]).collect(),
        }
    }

    pub fn number_of_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of reals
    pub fn dim(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    /// Same registry base and block sizes
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.base_index == other.base_index
            && self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(other.blocks.iter())
                .all(|(a, b)| a.len() == b.len())
    }

    /// Sub-vector of a parameter variable
    #[inline]
    pub fn block(&self, var: &Variable) -> &[f64] {
        &self.blocks[var.id() - self.base_index]
    }

    #[inline]
    pub fn block_mut(&mut self, var: &Variable) -> &mut [f64] {
        &mut self.blocks[var.id() - self.base_index]
    }

    pub fn get(&self, var: &Variable) -> Option<&[f64]> {
        var.id()
            .checked_sub(self.base_index)
            .and_then(|k| self.blocks.get(k))
            .map(|b| b.as_slice())
    }

    pub fn blocks(&self) -> std::slice::Iter<'_, Vec<f64>> {
        self.blocks.iter()
    }

    pub fn blocks_mut(&mut self) -> std::slice::IterMut<'_, Vec<f64>> {
        self.blocks.iter_mut()
    }

    /// `self += other`
    pub fn sum(&mut self, other: &Self) {
        debug_assert!(self.is_compatible(other));
        for (a, b) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            for (x, y) in a.iter_mut().zip(b.iter()) {
                *x += y;
            }
        }
    }

    /// `self *= s`
    pub fn multiply_by(&mut self, s: f64) {
        for x in self.blocks.iter_mut().flat_map(|b| b.iter_mut()) {
            *x *= s;
        }
    }

    /// `a * self + b * other`
    pub fn weighted_combination(&self, a: f64, other: &Self, b: f64) -> Self {
        debug_assert!(self.is_compatible(other));
        let blocks = self
            .blocks
            .iter()
            .zip(other.blocks.iter())
            .map(|(x, y)| x.iter().zip(y.iter()).map(|(x, y)| a * x + b * y).collect())
            .collect();
        Self {
            base_index: self.base_index,
            blocks,
        }
    }

    /// Largest absolute element-wise difference
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .flat_map(|(a, b)| a.iter().zip(b.iter()))
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    /// Flattened copy in block order
    pub fn to_vec(&self) -> Vec<f64> {
        self.blocks.iter().flatten().copied().collect()
    }
}

impl AddAssign<&CompoundVector> for CompoundVector {
    fn add_assign(&mut self, other: &CompoundVector) {
        self.sum(other);
    }
}

impl Add for CompoundVector {
    type Output = CompoundVector;

    fn add(mut self, other: CompoundVector) -> CompoundVector {
        self.sum(&other);
        self
    }
}
