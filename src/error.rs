// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2024 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Crate-wide error aggregation. Each subsystem (wire, channel, link, switch,
//! court, db) defines its own error enum close to the code that raises it;
//! this type only `#[from]`s them for callers that cross subsystem
//! boundaries, mirroring how `channel::bolt::channel::Error` aggregates
//! `funding::Error`, `PolicyError` and `ReestablishError` in the teacher
//! crate.

use crate::chan::{self, PolicyError};
use crate::court;
use crate::db;
use crate::switch;
use crate::wire;

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// wire codec error: {0}
    #[from]
    Wire(wire::Error),

    /// channel state machine error: {0}
    #[from]
    Channel(chan::Error),

    /// channel policy violation: {0}
    #[from]
    Policy(PolicyError),

    /// HTLC switch error: {0}
    #[from]
    Switch(switch::Error),

    /// contract court error: {0}
    #[from]
    Court(court::Error),

    /// channel database error: {0}
    #[from]
    Db(db::Error),

    /// operation is not valid in the current channel lifecycle stage
    /// {current:?}; requires one of {required:?}
    LifecycleMismatch {
        current: chan::Lifecycle,
        required: &'static [chan::Lifecycle],
    },
}
