//! Validated label specification and reaction transitions.

use std::collections::{BTreeMap, BTreeSet};

use lf_model::{EntityKind, Model, Reaction};

use crate::error::{LabelError, LabelResult};
use crate::isotopomer::Isotopomers;

/// Upper bound on label positions of one variable, and on the concatenated
/// substrate positions of one reaction.
pub const MAX_POSITIONS: usize = 24;

/// Label positions and transition maps, checked against a base model.
#[derive(Debug, Clone)]
pub(crate) struct Labeling {
    pub isotopomers: BTreeMap<String, Isotopomers>,
    pub maps: BTreeMap<String, Vec<usize>>,
}

impl Labeling {
    pub fn new(
        model: &Model,
        label_variables: BTreeMap<String, usize>,
        label_maps: BTreeMap<String, Vec<usize>>,
    ) -> LabelResult<Self> {
        let mut isotopomers = BTreeMap::new();
        for (name, positions) in label_variables {
            if model.kind_of(&name) != Some(EntityKind::Variable) {
                return Err(LabelError::UnknownLabelVariable { name });
            }
            if positions == 0 || positions > MAX_POSITIONS {
                return Err(LabelError::PositionCount {
                    name,
                    positions,
                    max: MAX_POSITIONS,
                });
            }
            isotopomers.insert(name.clone(), Isotopomers::new(&name, positions));
        }
        let labeling = Self {
            isotopomers,
            maps: BTreeMap::new(),
        };

        // Check every map against its reaction up front
        for (name, map) in &label_maps {
            let reaction = model
                .reactions()
                .iter()
                .find(|r| &r.name == name)
                .ok_or_else(|| LabelError::UnknownReaction { name: name.clone() })?;
            Transition::new(reaction, &labeling, map)?;
        }
        Ok(Self {
            maps: label_maps,
            ..labeling
        })
    }

    pub fn positions(&self, name: &str) -> usize {
        self.isotopomers.get(name).map_or(0, Isotopomers::positions)
    }

    pub fn is_labeled(&self, name: &str) -> bool {
        self.isotopomers.contains_key(name)
    }

    pub fn isotopomers_of(&self, name: &str) -> LabelResult<&Isotopomers> {
        self.isotopomers
            .get(name)
            .ok_or_else(|| LabelError::UnknownLabelVariable {
                name: name.to_string(),
            })
    }

    /// Labeled positions per variable, checked and deduplicated.
    pub fn initial_positions<I, S>(&self, initial_labels: I) -> LabelResult<BTreeMap<String, Vec<usize>>>
    where
        I: IntoIterator<Item = (S, Vec<usize>)>,
        S: AsRef<str>,
    {
        let mut out = BTreeMap::new();
        for (name, positions) in initial_labels {
            let name = name.as_ref();
            let iso = self.isotopomers_of(name)?;
            if let Some(&position) = positions.iter().find(|&&p| p >= iso.positions()) {
                return Err(LabelError::PositionOutOfRange {
                    name: name.to_string(),
                    position,
                    positions: iso.positions(),
                });
            }
            let unique: BTreeSet<usize> = positions.into_iter().collect();
            out.insert(name.to_string(), unique.into_iter().collect());
        }
        Ok(out)
    }

    /// Unmapped reactions may not change labeled variables.
    pub fn check_unmapped(&self, reaction: &Reaction) -> LabelResult<()> {
        match reaction
            .stoichiometry
            .iter()
            .find(|(v, c)| *c != 0.0 && self.is_labeled(v))
        {
            Some((variable, _)) => Err(LabelError::UnmappedReaction {
                reaction: reaction.name.clone(),
                variable: variable.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Rewrite references to labeled variables into their totals.
    pub fn rewrite_args(&self, args: &[String]) -> Vec<String> {
        args.iter().map(|a| self.rewrite_arg(a)).collect()
    }

    pub fn rewrite_arg(&self, arg: &str) -> String {
        match self.isotopomers.get(arg) {
            Some(iso) => iso.total_name(),
            None => arg.to_string(),
        }
    }
}

/// One labeled molecule taking part in a reaction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Slot {
    pub variable: String,
    pub positions: usize,
    /// First position of this slot in the concatenated position string
    pub offset: usize,
}

/// A reaction unpacked into labeled substrate and product slots.
///
/// Integer stoichiometry `n` of a labeled variable yields `n` slots.
/// Unlabeled participants keep their coefficients.
#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub substrates: Vec<Slot>,
    pub products: Vec<Slot>,
    pub n_substrate: usize,
    pub n_product: usize,
    pub n_external: usize,
    pub map: Vec<usize>,
    pub unlabeled: Vec<(String, f64)>,
}

impl Transition {
    pub fn new(reaction: &Reaction, labeling: &Labeling, map: &[usize]) -> LabelResult<Self> {
        let mut substrates = Vec::new();
        let mut products = Vec::new();
        let mut unlabeled = Vec::new();
        let (mut n_substrate, mut n_product) = (0, 0);

        for (variable, coeff) in &reaction.stoichiometry {
            let positions = labeling.positions(variable);
            if positions == 0 {
                unlabeled.push((variable.clone(), *coeff));
                continue;
            }
            if coeff.fract() != 0.0 {
                return Err(LabelError::FractionalStoichiometry {
                    reaction: reaction.name.clone(),
                    variable: variable.clone(),
                    coefficient: *coeff,
                });
            }
            let count = coeff.abs() as usize;
            for _ in 0..count {
                if *coeff < 0.0 {
                    substrates.push(Slot {
                        variable: variable.clone(),
                        positions,
                        offset: n_substrate,
                    });
                    n_substrate += positions;
                } else {
                    products.push(Slot {
                        variable: variable.clone(),
                        positions,
                        offset: n_product,
                    });
                    n_product += positions;
                }
            }
        }

        if n_substrate > MAX_POSITIONS {
            return Err(LabelError::PositionCount {
                name: reaction.name.clone(),
                positions: n_substrate,
                max: MAX_POSITIONS,
            });
        }
        if map.len() != n_product {
            return Err(LabelError::MapLength {
                reaction: reaction.name.clone(),
                expected: n_product,
                got: map.len(),
            });
        }
        let n_external = n_product.saturating_sub(n_substrate);
        let available = n_substrate + n_external;
        if let Some(&index) = map.iter().find(|&&i| i >= available) {
            return Err(LabelError::SourceOutOfRange {
                reaction: reaction.name.clone(),
                index,
                available,
            });
        }

        Ok(Self {
            substrates,
            products,
            n_substrate,
            n_product,
            n_external,
            map: map.to_vec(),
            unlabeled,
        })
    }

    /// Whether any labeled variable takes part.
    pub fn is_labeled(&self) -> bool {
        self.n_substrate + self.n_product > 0
    }

    /// Concatenated product bitmask for a substrate bitmask; external
    /// sources are always labeled.
    pub fn product_mask(&self, substrate_mask: usize) -> usize {
        let external = ((1usize << self.n_external) - 1) << self.n_substrate;
        let source = substrate_mask | external;
        self.map
            .iter()
            .enumerate()
            .fold(0, |acc, (j, &s)| acc | (((source >> s) & 1) << j))
    }

    fn locate(slots: &[Slot], index: usize) -> (&Slot, usize) {
        let slot = slots
            .iter()
            .rev()
            .find(|s| s.offset <= index)
            .unwrap_or(&slots[0]);
        (slot, index - slot.offset)
    }

    /// Slot and local position of a concatenated substrate position.
    pub fn substrate_at(&self, index: usize) -> (&Slot, usize) {
        Self::locate(&self.substrates, index)
    }

    /// Slot and local position of a concatenated product position.
    pub fn product_at(&self, index: usize) -> (&Slot, usize) {
        Self::locate(&self.products, index)
    }
}

/// Bits of `mask` belonging to `slot`.
pub(crate) fn slot_mask(mask: usize, slot: &Slot) -> usize {
    (mask >> slot.offset) & ((1usize << slot.positions) - 1)
}
