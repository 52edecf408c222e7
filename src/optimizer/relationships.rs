//! Category relationship table
//!
//! Static transfer policy: which categories may donate to or receive from
//! which, and how readily.

use crate::models::Category;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TransferDifficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CategoryRelationship {
    pub category: Category,
    pub essential: bool,
    pub transfer_difficulty: TransferDifficulty,
    pub can_give_to: &'static [Category],
    pub can_receive_from: &'static [Category],
}

use Category::*;

/// One entry per category, in declaration order
pub const RELATIONSHIPS: [CategoryRelationship; 6] = [
    CategoryRelationship {
        category: Housing,
        essential: true,
        transfer_difficulty: TransferDifficulty::Hard,
        can_give_to: &[],
        can_receive_from: &[Entertainment, Food],
    },
    CategoryRelationship {
        category: Food,
        essential: true,
        transfer_difficulty: TransferDifficulty::Medium,
        can_give_to: &[Housing, Transportation],
        can_receive_from: &[Entertainment, Healthcare, Utilities],
    },
    CategoryRelationship {
        category: Transportation,
        essential: true,
        transfer_difficulty: TransferDifficulty::Medium,
        can_give_to: &[Housing],
        can_receive_from: &[Entertainment, Food],
    },
    CategoryRelationship {
        category: Utilities,
        essential: true,
        transfer_difficulty: TransferDifficulty::Easy,
        can_give_to: &[Housing, Food, Transportation],
        can_receive_from: &[],
    },
    CategoryRelationship {
        category: Healthcare,
        essential: true,
        transfer_difficulty: TransferDifficulty::Easy,
        can_give_to: &[Housing, Food, Transportation],
        can_receive_from: &[],
    },
    CategoryRelationship {
        category: Entertainment,
        essential: false,
        transfer_difficulty: TransferDifficulty::Easy,
        can_give_to: &[Housing, Food, Transportation],
        can_receive_from: &[],
    },
];

pub fn relationship(category: Category) -> &'static CategoryRelationship {
    // RELATIONSHIPS is indexed by declaration order
    &RELATIONSHIPS[category as usize]
}

/// Either side's rule is enough to permit the transfer.
pub fn transfer_allowed(source: Category, destination: Category) -> bool {
    if source == destination {
        return false;
    }
    relationship(destination).can_receive_from.contains(&source)
        || relationship(source).can_give_to.contains(&destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_indexed_by_declaration_order() {
        for category in Category::ALL {
            assert_eq!(relationship(category).category, category);
        }
    }

    #[test]
    fn test_transfer_rules() {
        // source-side rule
        assert!(transfer_allowed(Entertainment, Food));
        // destination-side rule
        assert!(transfer_allowed(Food, Housing));
        assert!(transfer_allowed(Utilities, Food));
        // nothing permits these
        assert!(!transfer_allowed(Housing, Food));
        assert!(!transfer_allowed(Food, Entertainment));
        assert!(!transfer_allowed(Transportation, Food));
        assert!(!transfer_allowed(Food, Food));
    }

    #[test]
    fn test_only_entertainment_is_discretionary() {
        let non_essential: Vec<_> = RELATIONSHIPS
            .iter()
            .filter(|r| !r.essential)
            .map(|r| r.category)
            .collect();
        assert_eq!(non_essential, vec![Entertainment]);
    }
}
