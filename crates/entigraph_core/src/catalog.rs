//! Relationship catalog.

use crate::error::CoreResult;
use crate::schema::{Direction, MetadataProvider, NavigationDetail, NavigationRelation};
use std::collections::HashMap;
use std::rc::Rc;

/// Per-type navigation metadata, memoized for one session.
///
/// The catalog is the only place the engine asks the metadata provider
/// about relations; every lookup after the first is served from memory.
pub struct RelationshipCatalog<'a, M: MetadataProvider + ?Sized> {
    metadata: &'a M,
    details: HashMap<String, Rc<NavigationDetail>>,
}

impl<'a, M: MetadataProvider + ?Sized> RelationshipCatalog<'a, M> {
    /// Creates an empty catalog over a metadata provider.
    pub fn new(metadata: &'a M) -> Self {
        Self {
            metadata,
            details: HashMap::new(),
        }
    }

    /// Returns the metadata provider.
    pub fn metadata(&self) -> &'a M {
        self.metadata
    }

    /// Returns the navigation relations of a type.
    ///
    /// Fails with `MetadataMissing` if the type is not declared.
    pub fn relations_of(&mut self, type_name: &str) -> CoreResult<Rc<NavigationDetail>> {
        if let Some(detail) = self.details.get(type_name) {
            return Ok(Rc::clone(detail));
        }
        let detail = Rc::new(self.metadata.relations_of(type_name)?);
        self.details
            .insert(type_name.to_string(), Rc::clone(&detail));
        Ok(detail)
    }

    /// Returns the opposite end of `relation`, owned by `owner`, if the
    /// partner type declares one.
    pub fn reciprocal_of(
        &mut self,
        owner: &str,
        relation: &NavigationRelation,
    ) -> CoreResult<Option<NavigationRelation>> {
        let partner = self.relations_of(&relation.partner_type)?;
        let found = partner
            .relations
            .iter()
            .find(|candidate| relation.is_reciprocal_of(owner, candidate, &partner.type_name))
            .cloned();
        Ok(found)
    }

    /// Returns the first relation through which a type references itself
    /// as principal, e.g. a tree node's parent pointer.
    pub fn self_relation(&mut self, type_name: &str) -> CoreResult<Option<NavigationRelation>> {
        let detail = self.relations_of(type_name)?;
        let found = detail
            .from_relations()
            .find(|r| r.partner_type == type_name)
            .cloned();
        Ok(found)
    }

    /// Returns every to-one navigation, on any declared type, that targets
    /// `target_type` and is not the reciprocal of a relation `target_type`
    /// owns itself.
    ///
    /// Results are `(owning type, relation)` pairs in declaration order.
    pub fn incoming_references(
        &mut self,
        target_type: &str,
    ) -> CoreResult<Vec<(String, NavigationRelation)>> {
        let own = self.relations_of(target_type)?;
        let mut incoming = Vec::new();
        for type_name in self.metadata.type_names() {
            let detail = self.relations_of(&type_name)?;
            for relation in &detail.relations {
                if relation.partner_type != target_type || !relation.is_to_one() {
                    continue;
                }
                let reciprocated = own
                    .relations
                    .iter()
                    .any(|r| r.is_reciprocal_of(target_type, relation, &type_name));
                if !reciprocated {
                    incoming.push((type_name.clone(), relation.clone()));
                }
            }
        }
        Ok(incoming)
    }

    /// Returns every relation on any declared type that points at
    /// `principal_type` from the dependent side.
    pub fn dependent_relations(
        &mut self,
        principal_type: &str,
    ) -> CoreResult<Vec<(String, NavigationRelation)>> {
        let mut found = Vec::new();
        for type_name in self.metadata.type_names() {
            let detail = self.relations_of(&type_name)?;
            found.extend(
                detail
                    .relations
                    .iter()
                    .filter(|r| r.direction == Direction::From && r.partner_type == principal_type)
                    .map(|r| (type_name.clone(), r.clone())),
            );
        }
        Ok(found)
    }
}
