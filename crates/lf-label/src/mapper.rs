//! Full isotopomer expansion.

use std::collections::BTreeMap;

use lf_model::{Function, Model, fns};
use tracing::debug;

use crate::error::{LabelError, LabelResult};
use crate::isotopomer::{Isotopomers, label_string};
use crate::labeling::{Labeling, Transition, slot_mask};

/// Expands a model into one variable per isotopomer.
///
/// Each labeled variable with `n` positions becomes `2^n` variables. Each
/// reaction with a label map becomes one reaction per combination of
/// substrate isotopomers. Its rate law is the original one with every
/// labeled substrate and product argument replaced by the isotopomer taking
/// part in that combination. Other labeled arguments read the totals.
#[derive(Debug, Clone)]
pub struct LabelMapper {
    model: Model,
    labeling: Labeling,
}

impl LabelMapper {
    /// `label_variables` maps variable names to their number of label
    /// positions; `label_maps` maps reaction names to their transition map.
    ///
    /// Entry `j` of a transition map is the concatenated substrate position
    /// that ends up at concatenated product position `j`. Indices beyond the
    /// substrate positions refer to externally supplied, always labeled
    /// positions.
    pub fn new<V, S, M, R>(model: Model, label_variables: V, label_maps: M) -> LabelResult<Self>
    where
        V: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
        M: IntoIterator<Item = (R, Vec<usize>)>,
        R: Into<String>,
    {
        let labeling = Labeling::new(
            &model,
            label_variables.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            label_maps.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )?;
        Ok(Self { model, labeling })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Isotopomer names of every labeled variable.
    pub fn get_isotopomers(&self) -> BTreeMap<String, Vec<String>> {
        self.labeling
            .isotopomers
            .iter()
            .map(|(k, iso)| (k.clone(), iso.names().to_vec()))
            .collect()
    }

    pub fn get_isotopomer_of(&self, name: &str) -> LabelResult<Vec<String>> {
        Ok(self.labeling.isotopomers_of(name)?.names().to_vec())
    }

    /// Isotopomers of `name` labeled at every given position.
    pub fn get_isotopomers_of_at_position(
        &self,
        name: &str,
        positions: &[usize],
    ) -> LabelResult<Vec<String>> {
        let iso = self.labeling.isotopomers_of(name)?;
        check_positions(iso, positions)?;
        Ok(iso.at_positions(positions).into_iter().map(String::from).collect())
    }

    /// Isotopomers of `name` with exactly `n` labels.
    pub fn get_isotopomers_of_with_n_labels(
        &self,
        name: &str,
        n: usize,
    ) -> LabelResult<Vec<String>> {
        let iso = self.labeling.isotopomers_of(name)?;
        Ok(iso.with_n_labels(n).into_iter().map(String::from).collect())
    }

    /// Fraction of `name` labeled at `position`, given concentrations of the
    /// expanded model.
    pub fn positional_enrichment(
        &self,
        concs: &BTreeMap<String, f64>,
        name: &str,
        position: usize,
    ) -> LabelResult<f64> {
        let iso = self.labeling.isotopomers_of(name)?;
        check_positions(iso, &[position])?;
        let value = |n: &str| {
            concs.get(n).copied().ok_or_else(|| LabelError::MissingValue {
                kind: "concentration",
                name: n.to_string(),
            })
        };
        let mut labeled = 0.0;
        for n in iso.at_positions(&[position]) {
            labeled += value(n)?;
        }
        let mut total = 0.0;
        for n in iso.names() {
            total += value(n)?;
        }
        Ok(if total == 0.0 { 0.0 } else { labeled / total })
    }

    /// Build the expanded model.
    ///
    /// `initial_labels` lists, per labeled variable, the labeled positions of
    /// the single isotopomer that holds the whole initial concentration.
    /// Variables not listed start fully unlabeled.
    pub fn build_model<I, S>(&self, initial_labels: I) -> LabelResult<Model>
    where
        I: IntoIterator<Item = (S, Vec<usize>)>,
        S: AsRef<str>,
    {
        let initial = self.labeling.initial_positions(initial_labels)?;
        let mut m = Model::new();

        m.add_parameters(
            self.model
                .parameters()
                .iter()
                .map(|p| (p.name.clone(), p.value)),
        )?;

        for var in self.model.variables() {
            let Some(iso) = self.labeling.isotopomers.get(&var.name) else {
                m.add_variable(var.name.clone(), var.initial_value)?;
                continue;
            };
            let start = initial
                .get(&var.name)
                .map_or(0, |ps| ps.iter().fold(0usize, |acc, &p| acc | (1 << p)));
            m.add_variables(iso.names().iter().enumerate().map(|(mask, n)| {
                let value = if mask == start { var.initial_value } else { 0.0 };
                (n.clone(), value)
            }))?;
        }

        for iso in self.labeling.isotopomers.values() {
            m.add_derived(iso.total_name(), fns::sum(), iso.names())?;
        }
        for d in self.model.derived() {
            m.add_derived(
                d.name.clone(),
                d.function.clone(),
                self.labeling.rewrite_args(&d.args),
            )?;
        }
        for r in self.model.readouts() {
            m.add_readout(
                r.name.clone(),
                r.function.clone(),
                self.labeling.rewrite_args(&r.args),
            )?;
        }

        for rxn in self.model.reactions() {
            let args = self.labeling.rewrite_args(&rxn.args);
            let transition = match self.labeling.maps.get(&rxn.name) {
                Some(map) => Transition::new(rxn, &self.labeling, map)?,
                None => {
                    self.labeling.check_unmapped(rxn)?;
                    m.add_reaction(
                        rxn.name.clone(),
                        rxn.function.clone(),
                        args,
                        rxn.stoichiometry.iter().map(|(k, v)| (k.as_str(), *v)),
                    )?;
                    continue;
                }
            };
            if !transition.is_labeled() {
                m.add_reaction(
                    rxn.name.clone(),
                    rxn.function.clone(),
                    args,
                    rxn.stoichiometry.iter().map(|(k, v)| (k.as_str(), *v)),
                )?;
                continue;
            }
            let n = self.expand_reaction(
                &mut m,
                rxn.name.as_str(),
                &rxn.function,
                &rxn.args,
                &transition,
            )?;
            debug!(reaction = %rxn.name, expanded = n, "expanded reaction");
        }
        Ok(m)
    }

    /// Add one reaction per substrate isotopomer combination; returns the
    /// number added.
    fn expand_reaction(
        &self,
        m: &mut Model,
        name: &str,
        function: &Function,
        args: &[String],
        t: &Transition,
    ) -> LabelResult<usize> {
        let external = "1".repeat(t.n_external);
        let count = 1usize << t.n_substrate;

        for substrate_mask in 0..count {
            let product_mask = t.product_mask(substrate_mask);

            let mut stoichiometry: Vec<(String, f64)> = t.unlabeled.clone();
            let mut substrates: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for slot in &t.substrates {
                let iso = self.labeling.isotopomers_of(&slot.variable)?;
                let variant = iso.name(slot_mask(substrate_mask, slot));
                add_coefficient(&mut stoichiometry, variant, -1.0);
                substrates.entry(slot.variable.as_str()).or_default().push(variant);
            }
            let mut products: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for slot in &t.products {
                let iso = self.labeling.isotopomers_of(&slot.variable)?;
                let variant = iso.name(slot_mask(product_mask, slot));
                add_coefficient(&mut stoichiometry, variant, 1.0);
                products.entry(slot.variable.as_str()).or_default().push(variant);
            }
            stoichiometry.retain(|(_, c)| *c != 0.0);

            // products override substrates of the same variable
            let mut replacements = substrates;
            replacements.extend(products);
            let rate_args = self.substitute(args, &replacements);

            m.add_reaction(
                format!(
                    "{name}__{}{external}",
                    label_string(substrate_mask, t.n_substrate)
                ),
                function.clone(),
                rate_args,
                stoichiometry,
            )?;
        }
        Ok(count)
    }

    /// Rate law arguments of one expanded reaction.
    ///
    /// The `k`th occurrence of a participant reads the variant of its `k`th
    /// slot. Labeled variables that do not take part read their totals.
    fn substitute(
        &self,
        args: &[String],
        replacements: &BTreeMap<&str, Vec<&str>>,
    ) -> Vec<String> {
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        args.iter()
            .map(|a| match replacements.get(a.as_str()) {
                Some(variants) => {
                    let k = seen.entry(a.as_str()).or_insert(0);
                    let variant = variants.get(*k).or_else(|| variants.last());
                    *k += 1;
                    variant.map_or_else(|| self.labeling.rewrite_arg(a), |v| v.to_string())
                }
                None => self.labeling.rewrite_arg(a),
            })
            .collect()
    }
}

fn add_coefficient(stoichiometry: &mut Vec<(String, f64)>, name: &str, coeff: f64) {
    match stoichiometry.iter_mut().find(|(n, _)| n == name) {
        Some((_, c)) => *c += coeff,
        None => stoichiometry.push((name.to_string(), coeff)),
    }
}

fn check_positions(iso: &Isotopomers, positions: &[usize]) -> LabelResult<()> {
    match positions.iter().find(|&&p| p >= iso.positions()) {
        Some(&position) => Err(LabelError::PositionOutOfRange {
            name: iso.base().to_string(),
            position,
            positions: iso.positions(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isomerization() -> Model {
        let mut m = Model::new();
        m.add_parameters([("kf", 1.0), ("kr", 1.0)])
            .unwrap()
            .add_variables([("A", 1.0), ("B", 1.0)])
            .unwrap()
            .add_reaction("f", fns::mass_action_1s(), ["A", "kf"], [("A", -1.0), ("B", 1.0)])
            .unwrap()
            .add_reaction("r", fns::mass_action_1s(), ["B", "kr"], [("B", -1.0), ("A", 1.0)])
            .unwrap();
        m
    }

    fn mapper() -> LabelMapper {
        LabelMapper::new(
            isomerization(),
            [("A", 3), ("B", 3)],
            [("f", vec![2, 1, 0]), ("r", vec![0, 1, 2])],
        )
        .unwrap()
    }

    #[test]
    fn variables_expand_to_all_isotopomers() {
        let m = mapper().build_model([("A", vec![0])]).unwrap();
        assert_eq!(m.variables().len(), 16);
        assert_eq!(m.reactions().len(), 16);
        assert_eq!(m.kind_of("A__total"), Some(lf_model::EntityKind::Derived));
        let a100 = m.variables().iter().find(|v| v.name == "A__100").unwrap();
        assert_eq!(a100.initial_value, 1.0);
        let b000 = m.variables().iter().find(|v| v.name == "B__000").unwrap();
        assert_eq!(b000.initial_value, 1.0);
    }

    #[test]
    fn reversed_map_permutes_labels() {
        let m = mapper().build_model(Vec::<(&str, Vec<usize>)>::new()).unwrap();
        let rxn = m.reactions().iter().find(|r| r.name == "f__100").unwrap();
        assert_eq!(rxn.coefficient("A__100"), Some(-1.0));
        assert_eq!(rxn.coefficient("B__001"), Some(1.0));
    }

    #[test]
    fn expanded_rates_sum_to_base_rate() {
        let mapper = mapper();
        let mut m = mapper.build_model([("A", vec![0, 2])]).unwrap();
        let mut state = vec![0.0; 16];
        // spread A over a few isotopomers, B left unlabeled
        let names = m.variable_names();
        for (i, n) in names.iter().enumerate() {
            state[i] = match n.as_str() {
                "A__000" => 0.2,
                "A__101" => 0.5,
                "A__011" => 0.3,
                "B__000" => 2.0,
                _ => 0.0,
            };
        }
        let fluxes = m.get_fluxes(0.0, &state).unwrap();
        let reactions = m.reaction_names();
        let sum_f: f64 = reactions
            .iter()
            .zip(&fluxes)
            .filter(|(n, _)| n.starts_with("f__"))
            .map(|(_, v)| v)
            .sum();
        let sum_r: f64 = reactions
            .iter()
            .zip(&fluxes)
            .filter(|(n, _)| n.starts_with("r__"))
            .map(|(_, v)| v)
            .sum();
        assert!((sum_f - 1.0).abs() < 1e-12);
        assert!((sum_r - 2.0).abs() < 1e-12);
    }

    #[test]
    fn initial_value_goes_to_one_isotopomer() {
        let m = mapper().build_model([("A", vec![1, 2])]).unwrap();
        let a: Vec<(&str, f64)> = m
            .variables()
            .iter()
            .filter(|v| v.name.starts_with("A__"))
            .map(|v| (v.name.as_str(), v.initial_value))
            .collect();
        assert_eq!(a.len(), 8);
        assert_eq!(a.iter().map(|(_, v)| v).sum::<f64>(), 1.0);
        let filled: Vec<_> = a.iter().filter(|(_, v)| *v != 0.0).collect();
        assert_eq!(filled, [&("A__011", 1.0)]);
    }

    #[test]
    fn participants_are_replaced_by_their_variants() {
        let mut m = Model::new();
        m.add_parameters([("kf", 1.0), ("kr", 1.0)])
            .unwrap()
            .add_variables([("A", 1.0), ("B", 1.0), ("E", 1.0)])
            .unwrap()
            .add_derived("E_scaled", fns::proportional(), ["E", "kf"])
            .unwrap()
            .add_reaction(
                "ex",
                fns::reversible_mass_action_1s_1p(),
                ["A", "B", "E", "kr"],
                [("A", -1.0), ("B", 1.0)],
            )
            .unwrap();
        let mapper =
            LabelMapper::new(m, [("A", 2), ("B", 2), ("E", 1)], [("ex", vec![1, 0])]).unwrap();
        let expanded = mapper.build_model(Vec::<(&str, Vec<usize>)>::new()).unwrap();
        let rxn = expanded.reactions().iter().find(|r| r.name == "ex__10").unwrap();
        // E does not take part, so it reads its total
        assert_eq!(rxn.args, ["A__10", "B__01", "E__total", "kr"]);
        let derived = expanded.derived().iter().find(|d| d.name == "E_scaled").unwrap();
        assert_eq!(derived.args, ["E__total", "kf"]);
    }

    #[test]
    fn unmapped_reaction_touching_labels_is_rejected() {
        let mapper = LabelMapper::new(isomerization(), [("A", 2)], [("f", vec![0, 1])]);
        // B is unlabeled, so f maps A's 2 positions onto nothing
        assert!(matches!(mapper, Err(LabelError::MapLength { .. })));

        let mapper =
            LabelMapper::new(isomerization(), [("A", 2), ("B", 2)], [("f", vec![0, 1])]).unwrap();
        let err = mapper.build_model(Vec::<(&str, Vec<usize>)>::new()).unwrap_err();
        assert!(matches!(err, LabelError::UnmappedReaction { .. }));
        assert!(err.is_expansion());
    }

    #[test]
    fn initial_label_positions_are_checked() {
        let err = mapper().build_model([("A", vec![3])]).unwrap_err();
        assert!(matches!(err, LabelError::PositionOutOfRange { position: 3, .. }));
        let err = mapper().build_model([("kf", vec![0])]).unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn queries_use_bitmask_order() {
        let mapper = mapper();
        assert_eq!(mapper.get_isotopomer_of("A").unwrap().len(), 8);
        assert_eq!(
            mapper.get_isotopomers_of_at_position("B", &[1, 2]).unwrap(),
            vec!["B__011", "B__111"]
        );
        assert_eq!(
            mapper.get_isotopomers_of_with_n_labels("A", 1).unwrap(),
            vec!["A__100", "A__010", "A__001"]
        );
        assert!(mapper.get_isotopomers_of_at_position("A", &[5]).is_err());
        assert_eq!(mapper.get_isotopomers().len(), 2);
    }
}
