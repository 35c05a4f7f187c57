//! Allocation matrix: assets × holders.
//!
//! ```text
//!              Holder1  Holder2  Holder3
//!   AAVE    [   30.0      0.0     12.0  ]   ← row sum = final portfolio
//!   WETH    [   20.0     15.0      0.0  ]
//!              ────     ────     ────
//!              50.0     15.0     12.0       ← column sum = active balance
//! ```
//!
//! Rows are the union of assets seen in any column, sorted; columns are the
//! contributing holders, sorted. Missing entries are zero.

use crate::intent::AssetId;
use nalgebra::{DMatrix, RowDVector};
use orion_env::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationMatrix {
    assets: Vec<AssetId>,
    holders: Vec<NodeId>,
    amounts: DMatrix<f64>,
}

impl AllocationMatrix {
    /// Assembles per-holder allocation vectors into a matrix.
    ///
    /// Empty columns are dropped. Returns `None` when nothing is left, which
    /// is how an idle cycle clears the matrix.
    pub fn from_columns(columns: BTreeMap<NodeId, BTreeMap<AssetId, f64>>) -> Option<Self> {
        let columns: BTreeMap<NodeId, BTreeMap<AssetId, f64>> =
            columns.into_iter().filter(|(_, col)| !col.is_empty()).collect();
        if columns.is_empty() {
            return None;
        }

        let assets: Vec<AssetId> = columns
            .values()
            .flat_map(|col| col.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let holders: Vec<NodeId> = columns.keys().copied().collect();

        let amounts = DMatrix::from_fn(assets.len(), holders.len(), |row, col| {
            columns[&holders[col]].get(&assets[row]).copied().unwrap_or(0.0)
        });

        Some(Self {
            assets,
            holders,
            amounts,
        })
    }

    /// Row labels.
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Column labels.
    pub fn holders(&self) -> &[NodeId] {
        &self.holders
    }

    /// Raw amounts, `assets().len()` × `holders().len()`.
    pub fn amounts(&self) -> &DMatrix<f64> {
        &self.amounts
    }

    /// Amount of `asset` allocated by `holder`, zero if either is absent.
    pub fn amount(&self, asset: &str, holder: NodeId) -> f64 {
        match (self.row_of(asset), self.column_of(holder)) {
            (Some(row), Some(col)) => self.amounts[(row, col)],
            _ => 0.0,
        }
    }

    /// One holder's allocation vector (non-zero entries only).
    pub fn column(&self, holder: NodeId) -> Option<BTreeMap<AssetId, f64>> {
        let col = self.column_of(holder)?;
        Some(
            self.assets
                .iter()
                .enumerate()
                .filter(|(row, _)| self.amounts[(*row, col)] != 0.0)
                .map(|(row, asset)| (asset.clone(), self.amounts[(row, col)]))
                .collect(),
        )
    }

    /// Column sums: each holder's active capital.
    pub fn active_balances(&self) -> BTreeMap<NodeId, f64> {
        self.holders
            .iter()
            .copied()
            .zip(self.amounts.row_sum().iter().copied())
            .collect()
    }

    /// Row sums: the combined per-asset portfolio.
    pub fn portfolio(&self) -> BTreeMap<AssetId, f64> {
        self.assets
            .iter()
            .cloned()
            .zip(self.amounts.column_sum().iter().copied())
            .collect()
    }

    /// Applies one scalar return per holder to its active capital.
    ///
    /// A holder's return is broadcast across all of its allocated assets, so
    /// its P&L is `r × active`. Holders missing from `returns` get zero.
    /// Returns the settled balance per holder, floored at zero: a return
    /// below -1 wipes the position out instead of going negative.
    pub fn settle(&self, returns: &BTreeMap<NodeId, f64>) -> BTreeMap<NodeId, f64> {
        let active = self.amounts.row_sum();
        let r = RowDVector::from_iterator(
            self.holders.len(),
            self.holders.iter().map(|h| returns.get(h).copied().unwrap_or(0.0)),
        );
        let pnl = active.component_mul(&r);
        let settled = active + pnl;

        self.holders
            .iter()
            .copied()
            .zip(settled.iter().copied())
            .map(|(holder, amount)| {
                if amount < 0.0 {
                    warn!("[{}] Settled balance {:.2} is negative, flooring to 0", holder, amount);
                }
                (holder, amount.max(0.0))
            })
            .collect()
    }

    /// Row-major copy of the amounts, for presentation.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.amounts
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }

    fn row_of(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    fn column_of(&self, holder: NodeId) -> Option<usize> {
        self.holders.iter().position(|h| *h == holder)
    }
}
