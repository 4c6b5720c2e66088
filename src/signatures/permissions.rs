//! DocMDP / FieldMDP permission accumulation.
//!
//! Each signature can add restrictions to a document but never lift one set
//! by an earlier signature. The accumulated state is folded one signature at a
//! time in the order the signatures were applied.
//!
//! See ISO 32000-1:2008, Section 12.8.2 (Transform Methods).

use serde::Serialize;

use super::types::{FieldLock, SignatureDictionary, TransformMethod};

/// DocMDP access level applied when `/P` is absent.
pub const DEFAULT_DOCMDP_LEVEL: i64 = 2;

/// Whether an operation is still permitted.
///
/// Ordered so that [`Permission::restrict`] is the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// The operation invalidates the certification
    Disallowed,
    /// The operation is permitted
    Allowed,
}

impl Permission {
    /// Combine with a further restriction. `Disallowed` always wins.
    pub fn restrict(self, other: Permission) -> Permission {
        self.min(other)
    }

    /// True if the operation is permitted.
    pub fn is_allowed(self) -> bool {
        self == Permission::Allowed
    }
}

/// Kind of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureType {
    /// Carries a DocMDP transform
    Certification,
    /// Any other signature
    Approval,
}

/// Permissions accumulated over the signatures folded so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionState {
    /// Some signature so far certified the document
    pub certified: bool,
    /// Filling in form fields
    pub fill_in: Permission,
    /// Adding or changing annotations
    pub annotations: Permission,
    /// Union of all field locks, without duplicates
    pub field_locks: Vec<FieldLock>,
}

impl Default for PermissionState {
    fn default() -> Self {
        Self {
            certified: false,
            fill_in: Permission::Allowed,
            annotations: Permission::Allowed,
            field_locks: Vec::new(),
        }
    }
}

impl PermissionState {
    /// Apply one signature's transforms, returning the next state.
    ///
    /// A `/P` level restricts the state wherever it appears; DocMDP without
    /// `/P` counts as level 2. Only DocMDP makes the signature a certification.
    pub fn apply(mut self, dict: &SignatureDictionary) -> (Self, SignatureType) {
        let signature_type = if dict.is_certification() {
            self.certified = true;
            SignatureType::Certification
        } else {
            SignatureType::Approval
        };

        for reference in &dict.references {
            let level = match (&reference.method, reference.permission_level) {
                (_, Some(level @ 1..=3)) => Some(level),
                (TransformMethod::DocMdp, Some(other)) => {
                    log::warn!("DocMDP /P {} out of range, using {}", other, DEFAULT_DOCMDP_LEVEL);
                    Some(DEFAULT_DOCMDP_LEVEL)
                },
                (TransformMethod::DocMdp, None) => Some(DEFAULT_DOCMDP_LEVEL),
                (method, Some(other)) => {
                    log::warn!("Ignoring {:?} /P {} out of range", method, other);
                    None
                },
                (_, None) => None,
            };
            if let Some(level) = level {
                self.restrict_to_level(level);
            }

            if let Some(lock) = &reference.lock {
                if !self.field_locks.contains(lock) {
                    self.field_locks.push(lock.clone());
                }
            }
        }

        (self, signature_type)
    }

    fn restrict_to_level(&mut self, level: i64) {
        match level {
            1 => {
                self.fill_in = self.fill_in.restrict(Permission::Disallowed);
                self.annotations = self.annotations.restrict(Permission::Disallowed);
            },
            2 => {
                self.annotations = self.annotations.restrict(Permission::Disallowed);
            },
            _ => {},
        }
    }
}

/// Accumulated state right after folding one signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSnapshot {
    /// Type of the folded signature
    pub signature_type: SignatureType,
    /// State after the fold
    #[serde(flatten)]
    pub state: PermissionState,
}

/// Folds signatures into a [`PermissionState`].
#[derive(Debug, Default)]
pub struct PermissionAccumulator {
    state: PermissionState,
}

impl PermissionAccumulator {
    /// Start from the unrestricted state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the next signature (in chronological order) and snapshot the result.
    pub fn fold(&mut self, dict: &SignatureDictionary) -> PermissionSnapshot {
        let (next, signature_type) = std::mem::take(&mut self.state).apply(dict);
        self.state = next;
        log::debug!(
            "Folded {:?} signature: fill-in {:?}, annotations {:?}, {} lock(s)",
            signature_type,
            self.state.fill_in,
            self.state.annotations,
            self.state.field_locks.len()
        );
        PermissionSnapshot {
            signature_type,
            state: self.state.clone(),
        }
    }

    /// Current accumulated state.
    pub fn state(&self) -> &PermissionState {
        &self.state
    }
}
