//! CSS selector specificity calculation.
//! See <https://www.w3.org/TR/selectors-3/#specificity>

use crate::{ComplexSelector, CompoundSelector, SelectorList, SimpleSelector};

/// Specificity triple (a, b, c).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity(pub u16, pub u16, pub u16);

impl Specificity {
    fn saturating_add(self, other: Self) -> Self {
        Self(
            self.0.saturating_add(other.0),
            self.1.saturating_add(other.1),
            self.2.saturating_add(other.2),
        )
    }
}

/// Compute the specificity of a compound selector.
pub fn specificity_of_compound(compound: &CompoundSelector) -> Specificity {
    compound
        .simples
        .iter()
        .fold(Specificity::default(), |acc, simple| {
            let add = match simple {
                SimpleSelector::IdSelector(_) => Specificity(1, 0, 0),
                SimpleSelector::Class(_)
                | SimpleSelector::Attribute { .. }
                | SimpleSelector::Pseudo(_) => Specificity(0, 1, 0),
                SimpleSelector::Type(_) => Specificity(0, 0, 1),
                SimpleSelector::Universal => Specificity::default(),
            };
            acc.saturating_add(add)
        })
}

/// Compute the specificity of a complex selector (sum of its compounds).
pub fn specificity_of_complex(sel: &ComplexSelector) -> Specificity {
    sel.rest
        .iter()
        .fold(specificity_of_compound(&sel.first), |acc, (_, compound)| {
            acc.saturating_add(specificity_of_compound(compound))
        })
}

impl SelectorList {
    /// Highest specificity among the members that satisfy `matches`.
    pub fn matching_specificity(
        &self,
        mut matches: impl FnMut(&ComplexSelector) -> bool,
    ) -> Option<Specificity> {
        self.selectors
            .iter()
            .filter(|selector| matches(selector))
            .map(specificity_of_complex)
            .max()
    }
}
