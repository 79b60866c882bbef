//! Claim sets carried inside tokens.
//!
//! Each claim keeps the textual value of a parameter plus its value type,
//! so a parameter survives the trip through a token unchanged. The value
//! type travels with the claim; decoding never guesses it from JSON.

use serde::{Deserialize, Serialize};

use crate::protocol::{EndSessionRequest, ParameterKind, ParameterValue, Parameters};
use crate::token::TokenError;

/// A single claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
    pub value_type: ParameterKind,
}

impl Claim {
    pub fn from_parameter(name: &str, value: &ParameterValue) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_text(),
            value_type: value.kind(),
        }
    }

    pub fn to_parameter(&self) -> Result<ParameterValue, TokenError> {
        ParameterValue::from_text(&self.value, self.value_type)
            .map_err(|err| TokenError::InvalidClaims(format!("claim `{}`: {err}", self.name)))
    }
}

/// Ordered collection of claims; names are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: Vec<Claim>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// One claim per request parameter.
    pub fn from_request(request: &EndSessionRequest) -> Self {
        Self {
            claims: request
                .parameters()
                .iter()
                .map(|(name, value)| Claim::from_parameter(name, value))
                .collect(),
        }
    }

    /// Add a claim, replacing any claim with the same name.
    pub fn push(&mut self, claim: Claim) {
        self.claims.retain(|existing| existing.name != claim.name);
        self.claims.push(claim);
    }

    pub fn get(&self, name: &str) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Decode every claim back into a parameter.
    pub fn to_parameters(&self) -> Result<Parameters, TokenError> {
        self.claims
            .iter()
            .map(|claim| Ok((claim.name.clone(), claim.to_parameter()?)))
            .collect::<Result<Vec<_>, TokenError>>()
            .map(|pairs| pairs.into_iter().collect())
    }

    /// Build a set from decoded claims, refusing any whose text does not
    /// match its value type. Later duplicates replace earlier ones.
    pub fn from_claims(claims: Vec<Claim>) -> Result<Self, TokenError> {
        let mut set = Self::new();
        for claim in claims {
            claim.to_parameter()?;
            set.push(claim);
        }
        Ok(set)
    }
}
