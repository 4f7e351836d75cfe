//! [`PermissionMatrix`] – maps a recognised [`Identity`] to the commands it
//! may issue.
//!
//! Only permission-gated commands (hand letters and pump numbers, see
//! [`Command::requires_permission`]) can be granted.  An identity without an
//! entry maps to the empty set, so every lookup for it is denied.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use gate_types::{Command, GateError, Identity, Letter};
use tracing::debug;

/// Role → ordered set of allowed gated commands.
///
/// # Example
///
/// ```
/// use gate_kernel::permission_matrix::PermissionMatrix;
/// use gate_types::{Command, Identity, Letter};
///
/// let matrix = PermissionMatrix::standard();
///
/// assert!(matrix.is_allowed(Identity::Employee, &Command::Letter(Letter::L)));
/// assert!(!matrix.is_allowed(Identity::Employee, &Command::number(2).unwrap()));
/// assert!(!matrix.is_allowed(Identity::Nobody, &Command::Letter(Letter::L)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PermissionMatrix {
    grants: HashMap<Identity, BTreeSet<Command>>,
}

impl PermissionMatrix {
    /// Create an empty matrix that denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// The matrix deployed with the access-control demo.
    ///
    /// | Identity | Allowed |
    /// |---|---|
    /// | Master | `1 2 3 4 5 L O V` |
    /// | Chief | `1 2 L O` |
    /// | Employee | `L O` |
    /// | Nobody | – |
    pub fn standard() -> Self {
        let mut matrix = Self::new();
        let pumps = |max: u8| (1..=max).filter_map(|n| Command::number(n).ok());
        let door = [Command::Letter(Letter::L), Command::Letter(Letter::O)];

        for cmd in pumps(gate_types::PUMP_COUNT).chain(Letter::ALL.map(Command::Letter)) {
            matrix.insert(Identity::Master, cmd);
        }
        for cmd in pumps(2).chain(door) {
            matrix.insert(Identity::Chief, cmd);
        }
        for cmd in door {
            matrix.insert(Identity::Employee, cmd);
        }
        matrix
    }

    /// Build a matrix from a `role → [token, …]` table, e.g. the
    /// `[permissions]` section of the config file.
    ///
    /// Tokens use the short form (`"1"`..`"5"`, `"L"`, `"O"`, `"V"`).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] for an unknown role name or a token that
    /// does not name a gated command.
    pub fn from_table(table: &BTreeMap<String, Vec<String>>) -> Result<Self, GateError> {
        let mut matrix = Self::new();
        for (role, tokens) in table {
            let identity = Identity::from_key(role)
                .ok_or_else(|| GateError::Config(format!("unknown role '{role}'")))?;
            // A role listed with no tokens still gets an (empty) entry.
            matrix.grants.entry(identity).or_default();
            for token in tokens {
                let cmd = Command::from_permission_token(token).map_err(|e| {
                    GateError::Config(format!("role '{role}': bad permission '{token}': {e}"))
                })?;
                matrix.grant(identity, cmd)?;
            }
        }
        Ok(matrix)
    }

    /// Grant `cmd` to `identity`.  Duplicate grants are silently ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Config`] when `cmd` is not a gated command; those
    /// bypass the matrix entirely and granting them would be meaningless.
    pub fn grant(&mut self, identity: Identity, cmd: Command) -> Result<(), GateError> {
        if !cmd.requires_permission() {
            return Err(GateError::Config(format!(
                "{cmd} is not permission-gated and cannot be granted"
            )));
        }
        debug!(%identity, command = %cmd, "permission granted");
        self.insert(identity, cmd);
        Ok(())
    }

    /// Revoke `cmd` from `identity`.  No-ops if it was never granted.
    pub fn revoke(&mut self, identity: Identity, cmd: &Command) {
        if let Some(set) = self.grants.get_mut(&identity)
            && set.remove(cmd)
        {
            debug!(%identity, command = %cmd, "permission revoked");
        }
    }

    /// `true` when `cmd` is in the allowed set of `identity`.
    pub fn is_allowed(&self, identity: Identity, cmd: &Command) -> bool {
        self.grants
            .get(&identity)
            .is_some_and(|set| set.contains(cmd))
    }

    /// Return `Ok(())` when `identity` may issue `cmd`, or
    /// [`GateError::Unauthorized`] otherwise.
    pub fn check(&self, identity: Identity, cmd: &Command) -> Result<(), GateError> {
        if self.is_allowed(identity, cmd) {
            Ok(())
        } else {
            Err(GateError::Unauthorized {
                identity,
                command: *cmd,
            })
        }
    }

    /// The allowed commands of `identity`, in command order.
    pub fn allowed(&self, identity: Identity) -> impl Iterator<Item = &Command> {
        self.grants.get(&identity).into_iter().flatten()
    }

    fn insert(&mut self, identity: Identity, cmd: Command) {
        self.grants.entry(identity).or_default().insert(cmd);
    }
}
