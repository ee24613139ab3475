//! Repeated substructures of a case.
//!
//! Every child kind is declared exactly once, in the `child_kinds!`
//! invocation below. The declaration produces the typed struct, its
//! column ← source-key map, the [`ChildKind`] variant, the storage table and
//! the payload list key. Adding a source field is a one-line edit there.
//!
//! All child values are text. Positions are implicit in the order of each
//! `Vec`; storage assigns `sequence_index` from that order.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, case::FieldMap};

macro_rules! child_kinds {
  ($(
    $(#[$meta:meta])*
    $kind:ident in $list:ident {
      table:  $table:literal,
      source: $source:literal,
      fields: { $($field:ident: $src:literal),+ $(,)? } $(,)?
    }
  ),+ $(,)?) => {
    /// Discriminant for the seven child kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ChildKind { $($kind),+ }

    impl ChildKind {
      /// Every kind, in storage/export order.
      pub const ALL: &'static [ChildKind] = &[$(ChildKind::$kind),+];

      /// Storage table holding this kind.
      pub fn table(self) -> &'static str {
        match self { $(ChildKind::$kind => $table),+ }
      }

      /// Key of the list in the raw payload.
      pub fn source_key(self) -> &'static str {
        match self { $(ChildKind::$kind => $source),+ }
      }

      /// Column ← source key, in column order.
      pub fn fields(self) -> &'static [FieldMap] {
        match self { $(ChildKind::$kind => $kind::FIELDS),+ }
      }
    }

    $(
      $(#[$meta])*
      #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
      pub struct $kind { $(pub $field: String),+ }

      impl $kind {
        pub const FIELDS: &'static [FieldMap] = &[
          $(FieldMap { column: stringify!($field), source: $src, aliases: &[] }),+
        ];

        /// Values in [`Self::FIELDS`] order.
        pub fn to_values(&self) -> Vec<String> {
          vec![$(self.$field.clone()),+]
        }

        /// Inverse of [`Self::to_values`]; missing trailing values default
        /// to empty.
        pub fn from_values(values: Vec<String>) -> Self {
          let mut values = values.into_iter();
          Self { $($field: values.next().unwrap_or_default()),+ }
        }
      }
    )+

    /// All repeated substructures of one case, each in source order.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Children { $(pub $list: Vec<$kind>),+ }

    impl Children {
      /// Column values of every entry of `kind`, in order.
      pub fn values(&self, kind: ChildKind) -> Vec<Vec<String>> {
        match kind {
          $(ChildKind::$kind => self.$list.iter().map($kind::to_values).collect()),+
        }
      }

      /// Append one entry of `kind` built from column values.
      pub fn push_values(&mut self, kind: ChildKind, values: Vec<String>) {
        match kind {
          $(ChildKind::$kind => self.$list.push($kind::from_values(values))),+
        }
      }

      pub fn len(&self, kind: ChildKind) -> usize {
        match kind { $(ChildKind::$kind => self.$list.len()),+ }
      }

      pub fn is_empty(&self) -> bool {
        ChildKind::ALL.iter().all(|k| self.len(*k) == 0)
      }
    }
  };
}

child_kinds! {
  /// A litigant or representative named on the case.
  Party in parties {
    table:  "parties",
    source: "partes",
    fields: { role: "tipo", name: "nome" },
  },

  /// A procedural movement.
  Movement in movements {
    table:  "movements",
    source: "andamentos",
    fields: {
      date:   "data",
      name:   "nome",
      detail: "complemento",
      judge:  "julgador",
    },
  },

  /// A decision rendered on the case.
  Decision in decisions {
    table:  "decisions",
    source: "decisoes",
    fields: {
      date:          "data",
      name:          "nome",
      judge:         "julgador",
      detail:        "complemento",
      document_link: "link",
    },
  },

  /// Physical or electronic routing of the case file between bodies.
  Transfer in transfers {
    table:  "transfers",
    source: "deslocamentos",
    fields: {
      sent_date:     "data_enviado",
      received_date: "data_recebido",
      sender:        "enviado_por",
      receiver:      "recebido_por",
      routing_slip:  "guia",
    },
  },

  Petition in petitions {
    table:  "petitions",
    source: "peticoes",
    fields: {
      date:          "data",
      kind:          "tipo",
      author:        "autor",
      received_date: "recebido_data",
      received_by:   "recebido_por",
    },
  },

  Appeal in appeals {
    table:  "appeals",
    source: "recursos",
    fields: {
      date:   "data",
      name:   "nome",
      judge:  "julgador",
      detail: "complemento",
      author: "autor",
    },
  },

  /// A hearing-schedule (docket) entry.
  DocketEntry in docket_entries {
    table:  "docket_entries",
    source: "pautas",
    fields: {
      date:            "data",
      name:            "nome",
      detail:          "complemento",
      reporting_judge: "relator",
    },
  },
}

impl ChildKind {
  /// Storage column names, in order.
  pub fn columns(self) -> impl Iterator<Item = &'static str> {
    self.fields().iter().map(|f| f.column)
  }
}

impl FromStr for ChildKind {
  type Err = Error;

  /// Accepts the table name or the payload list key.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ChildKind::ALL
      .iter()
      .copied()
      .find(|k| k.table() == s || k.source_key() == s)
      .ok_or_else(|| Error::UnknownChildKind(s.to_owned()))
  }
}
