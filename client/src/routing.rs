//! Sources a mixer channel or output can be routed from.

use crate::store::Snapshot;
use mixdesk_types::{EntityId, Input, Mixer, Player};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Input,
    Player,
    Mixer,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Input => "input",
            SourceKind::Player => "player",
            SourceKind::Mixer => "mixer",
        };
        f.write_str(name)
    }
}

/// One selectable source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSource {
    pub id: EntityId,
    pub display_name: String,
    pub kind: SourceKind,
}

/// Resolution of a routed reference against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No source, or a reference to a source that no longer exists
    Unset,
    Source(RouteSource),
}

impl Selection {
    pub fn is_unset(&self) -> bool {
        matches!(self, Selection::Unset)
    }

    pub fn source(&self) -> Option<&RouteSource> {
        match self {
            Selection::Unset => None,
            Selection::Source(source) => Some(source),
        }
    }
}

/// Union of inputs, players and mixers, in that order.
///
/// Derived from the three snapshots it was built from; rebuild when any of
/// their revisions move.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Arc<Vec<RouteSource>>,
    revisions: [u64; 3],
}

impl SourceCatalog {
    pub fn build(
        inputs: &Snapshot<Input>,
        players: &Snapshot<Player>,
        mixers: &Snapshot<Mixer>,
    ) -> Self {
        let inputs_iter = inputs.iter().map(|input| RouteSource {
            id: input.id.clone(),
            display_name: input.display_name.clone(),
            kind: SourceKind::Input,
        });
        let players_iter = players.iter().map(|player| RouteSource {
            id: player.id.clone(),
            display_name: player.name.clone(),
            kind: SourceKind::Player,
        });
        let mixers_iter = mixers.iter().map(|mixer| RouteSource {
            id: mixer.id.clone(),
            display_name: mixer.display_name.clone(),
            kind: SourceKind::Mixer,
        });

        Self {
            sources: Arc::new(inputs_iter.chain(players_iter).chain(mixers_iter).collect()),
            revisions: [inputs.revision(), players.revision(), mixers.revision()],
        }
    }

    /// Whether any of the given snapshots moved past the ones this catalog
    /// was built from.
    pub fn is_stale(
        &self,
        inputs: &Snapshot<Input>,
        players: &Snapshot<Player>,
        mixers: &Snapshot<Mixer>,
    ) -> bool {
        self.revisions != [inputs.revision(), players.revision(), mixers.revision()]
    }

    pub fn sources(&self) -> &[RouteSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources offered to a channel of `mixer`; a mixer never feeds itself.
    pub fn selectable_for<'a>(
        &'a self,
        mixer: Option<&'a EntityId>,
    ) -> impl Iterator<Item = &'a RouteSource> + 'a {
        self.sources
            .iter()
            .filter(move |source| Some(&source.id) != mixer)
    }

    pub fn resolve(&self, id: Option<&EntityId>) -> Selection {
        id.and_then(|id| self.sources.iter().find(|source| &source.id == id))
            .map_or(Selection::Unset, |source| Selection::Source(source.clone()))
    }
}
