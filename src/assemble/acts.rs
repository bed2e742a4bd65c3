//! Act layout: which act each chapter and kuchie plate belongs to.

use crate::manifest::{Act, VolumeStructure};

/// Act bookkeeping for one volume. A volume without structure is a single
/// implicit act.
#[derive(Debug, Clone)]
pub struct ActLayout<'a> {
    acts: &'a [Act],
}

impl<'a> ActLayout<'a> {
    pub fn new(structure: Option<&'a VolumeStructure>) -> Self {
        Self {
            acts: structure.map(|s| s.acts.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn is_multi_act(&self) -> bool {
        self.acts.len() >= 2
    }

    pub fn acts(&self) -> &'a [Act] {
        self.acts
    }

    /// The act the volume opens with.
    pub fn first_act(&self) -> u32 {
        self.acts.first().map(|a| a.number).unwrap_or(1)
    }

    /// Act whose chapter range holds `position`; `current` when none does
    /// or when the range would move backwards.
    pub fn act_for(&self, position: u32, current: u32) -> u32 {
        self.acts
            .iter()
            .find(|act| act.contains(position))
            .map(|act| act.number.max(current))
            .unwrap_or(current)
    }

    /// Acts after `from` up to and including `to`, in order.
    pub fn opened_between(&self, from: u32, to: u32) -> impl Iterator<Item = &'a Act> {
        self.acts.iter().filter(move |a| a.number > from && a.number <= to)
    }

    /// Acts after `from`, in order.
    pub fn after(&self, from: u32) -> impl Iterator<Item = &'a Act> {
        self.acts.iter().filter(move |a| a.number > from)
    }

    /// Whether a kuchie plate tagged `act` opens with the volume rather than
    /// with a later act.
    pub fn is_front_kuchie(&self, act: u32) -> bool {
        !self.is_multi_act() || act <= self.first_act() || !self.acts.iter().any(|a| a.number == act)
    }

    pub fn title(act: &Act) -> String {
        if act.title.is_empty() {
            format!("Act {}", act.number)
        } else {
            act.title.clone()
        }
    }
}
