//! Input selection
//!
//! Picks which owned notes fund an operation, and splits large selections
//! into consolidation rounds that fit the circuit.

use shade_privacy::PrivacyError;

use crate::error::{ProtocolError, Result};
use crate::store::OwnedNote;

/// Choose notes covering `amount` from `available` (any order).
///
/// Prefers the smallest single note that covers the amount. Otherwise takes
/// notes smallest first until the sum is reached.
pub fn select_inputs(available: &[OwnedNote], amount: u64) -> Result<Vec<OwnedNote>> {
    let mut sorted = available.to_vec();
    sorted.sort_by_key(|n| (n.amount(), n.leaf_index));

    if let Some(single) = sorted.iter().find(|n| n.amount().as_u64() >= amount) {
        return Ok(vec![single.clone()]);
    }

    let mut selected = Vec::new();
    let mut total: u128 = 0;
    for note in sorted {
        total += u128::from(note.amount().as_u64());
        selected.push(note);
        if total >= u128::from(amount) {
            return Ok(selected);
        }
    }

    Err(ProtocolError::InsufficientFunds {
        needed: amount,
        available: total,
    })
}

/// Split `notes` into groups of at most `max_inputs` for consolidation.
///
/// A trailing single note is left for the next round, where it joins the
/// outputs of this one. Returns `(groups, carried)`.
pub fn consolidation_rounds(
    notes: Vec<OwnedNote>,
    max_inputs: usize,
) -> Result<(Vec<Vec<OwnedNote>>, Vec<OwnedNote>)> {
    if notes.len() <= 1 {
        return Ok((Vec::new(), notes));
    }
    if max_inputs < 2 {
        return Err(PrivacyError::ArityExceeded {
            max: max_inputs,
            got: notes.len(),
        }
        .into());
    }

    let mut groups: Vec<Vec<OwnedNote>> = Vec::new();
    let mut carried = Vec::new();
    for chunk in notes.chunks(max_inputs) {
        if chunk.len() == 1 {
            carried.extend_from_slice(chunk);
        } else {
            groups.push(chunk.to_vec());
        }
    }
    Ok((groups, carried))
}
