//! Installation order resolution.
//!
//! The order is built in two passes. A baseline ranks every component:
//! foundational kinds first (bootstrap, then core), then the declared
//! sub-order, then everything else in discovery order. Pins are then applied
//! as edges of a dependency graph and the graph is sorted topologically,
//! breaking ties by baseline rank. Pins therefore always win over the
//! baseline, and the result is deterministic.

use std::collections::{BTreeSet, HashMap};

use crate::error::ResolveError;

use super::component::{Component, InstallationBatch};

/// Resolve `batch` into a total installation order.
///
/// Duplicate names collapse into one component at the position of the first
/// occurrence, with the attributes of the last one. Any reference to an
/// unknown component fails the whole resolution.
pub fn resolve(batch: &InstallationBatch) -> Result<Vec<Component>, ResolveError> {
    let components = collapse_duplicates(&batch.components);
    let index: HashMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    validate(&components, &index, &batch.declared_order)?;

    let baseline = baseline_order(&components, &index, &batch.declared_order);
    let mut rank = vec![0usize; components.len()];
    for (position, &idx) in baseline.iter().enumerate() {
        rank[idx] = position;
    }

    // Edge pin -> component: the pin must be installed first.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
    let mut in_degree = vec![0usize; components.len()];
    for (idx, component) in components.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for pin in &component.pins {
            let pin_idx = index[pin.as_str()];
            if seen.insert(pin_idx) {
                dependents[pin_idx].push(idx);
                in_degree[idx] += 1;
            }
        }
    }

    // Ready set keyed by baseline rank so ties resolve to the baseline.
    let mut ready: BTreeSet<(usize, usize)> = (0..components.len())
        .filter(|&idx| in_degree[idx] == 0)
        .map(|idx| (rank[idx], idx))
        .collect();
    let mut order = Vec::with_capacity(components.len());

    while let Some((_, idx)) = ready.pop_first() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert((rank[dependent], dependent));
            }
        }
    }

    if order.len() != components.len() {
        let cycle = baseline
            .iter()
            .filter(|&&idx| in_degree[idx] > 0)
            .map(|&idx| components[idx].name.clone())
            .collect();
        return Err(ResolveError::PinCycle(cycle));
    }

    let mut slots: Vec<Option<Component>> = components.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect())
}

fn collapse_duplicates(components: &[Component]) -> Vec<Component> {
    let mut out: Vec<Component> = Vec::with_capacity(components.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for component in components {
        match positions.get(component.name.as_str()) {
            Some(&pos) => {
                tracing::debug!(component = %component.name, "duplicate component, keeping last definition");
                out[pos] = component.clone();
            }
            None => {
                positions.insert(component.name.as_str(), out.len());
                out.push(component.clone());
            }
        }
    }
    out
}

fn validate(
    components: &[Component],
    index: &HashMap<&str, usize>,
    declared: &[String],
) -> Result<(), ResolveError> {
    if let Some(missing) = declared.iter().find(|name| !index.contains_key(name.as_str())) {
        return Err(ResolveError::UnknownDeclared(missing.clone()));
    }
    for component in components {
        for pin in &component.pins {
            if *pin == component.name {
                return Err(ResolveError::SelfPin(pin.clone()));
            }
            let Some(&pin_idx) = index.get(pin.as_str()) else {
                return Err(ResolveError::UnknownPin {
                    component: component.name.clone(),
                    pin: pin.clone(),
                });
            };
            if component.kind.is_foundational() && !components[pin_idx].kind.is_foundational() {
                return Err(ResolveError::FoundationalAfterOrdinary {
                    component: component.name.clone(),
                    pin: pin.clone(),
                });
            }
        }
    }
    Ok(())
}

fn baseline_order(
    components: &[Component],
    index: &HashMap<&str, usize>,
    declared: &[String],
) -> Vec<usize> {
    let mut placed = vec![false; components.len()];
    let mut order = Vec::with_capacity(components.len());

    let mut foundational: Vec<(u8, usize)> = components
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| c.kind.foundational_rank().map(|rank| (rank, idx)))
        .collect();
    foundational.sort();
    for (_, idx) in foundational {
        placed[idx] = true;
        order.push(idx);
    }

    for name in declared {
        let idx = index[name.as_str()];
        if !placed[idx] {
            placed[idx] = true;
            order.push(idx);
        }
    }

    for (idx, was_placed) in placed.iter().enumerate() {
        if !was_placed {
            order.push(idx);
        }
    }
    order
}
