use shared::{
    domain::{Character, CharacterId},
    protocol::SceneContext,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected(CharacterId),
    Unchanged,
    UnknownCharacter,
}

// A non-empty selection always names a character in `characters`.
#[derive(Debug, Default, Clone)]
pub struct CharacterDirectory {
    characters: Vec<Character>,
    selected: Option<CharacterId>,
    scene: Option<SceneContext>,
}

impl CharacterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new selection when it changed.
    pub fn replace(
        &mut self,
        characters: Vec<Character>,
        scene: Option<SceneContext>,
    ) -> Option<Option<CharacterId>> {
        self.characters = characters;
        self.scene = scene;

        let still_present = self
            .selected
            .as_ref()
            .is_some_and(|id| self.contains(id));
        if still_present {
            return None;
        }

        let next = self.characters.first().map(|c| c.id.clone());
        if next == self.selected {
            return None;
        }
        self.selected = next.clone();
        Some(next)
    }

    pub fn select(&mut self, character_id: &CharacterId) -> SelectOutcome {
        if !self.contains(character_id) {
            return SelectOutcome::UnknownCharacter;
        }
        if self.selected.as_ref() == Some(character_id) {
            return SelectOutcome::Unchanged;
        }
        self.selected = Some(character_id.clone());
        SelectOutcome::Selected(character_id.clone())
    }

    pub fn contains(&self, character_id: &CharacterId) -> bool {
        self.characters.iter().any(|c| &c.id == character_id)
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn selected(&self) -> Option<&CharacterId> {
        self.selected.as_ref()
    }

    pub fn selected_character(&self) -> Option<&Character> {
        let selected = self.selected.as_ref()?;
        self.characters.iter().find(|c| &c.id == selected)
    }

    pub fn scene(&self) -> Option<&SceneContext> {
        self.scene.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(id: &str, name: &str) -> Character {
        Character {
            id: CharacterId::from(id),
            name: name.to_string(),
            role: "role".to_string(),
            core_motivation: "motivation".to_string(),
        }
    }

    #[test]
    fn first_refresh_selects_first_character_in_response_order() {
        let mut directory = CharacterDirectory::new();
        let changed = directory.replace(
            vec![character("bartender", "Marcus"), character("sailor", "Finn")],
            None,
        );

        assert_eq!(changed, Some(Some(CharacterId::from("bartender"))));
        assert_eq!(directory.selected(), Some(&CharacterId::from("bartender")));
    }

    #[test]
    fn refresh_keeps_existing_selection_when_still_listed() {
        let mut directory = CharacterDirectory::new();
        directory.replace(
            vec![character("bartender", "Marcus"), character("sailor", "Finn")],
            None,
        );
        assert_eq!(
            directory.select(&CharacterId::from("sailor")),
            SelectOutcome::Selected(CharacterId::from("sailor"))
        );

        let changed = directory.replace(
            vec![character("guard", "Elena"), character("sailor", "Finn")],
            None,
        );
        assert_eq!(changed, None);
        assert_eq!(directory.selected(), Some(&CharacterId::from("sailor")));
    }

    #[test]
    fn refresh_reselects_when_previous_character_disappears() {
        let mut directory = CharacterDirectory::new();
        directory.replace(vec![character("bartender", "Marcus")], None);

        let changed = directory.replace(vec![character("guard", "Elena")], None);
        assert_eq!(changed, Some(Some(CharacterId::from("guard"))));

        let changed = directory.replace(Vec::new(), None);
        assert_eq!(changed, Some(None));
        assert!(directory.selected_character().is_none());
    }

    #[test]
    fn selecting_unknown_character_is_a_no_op() {
        let mut directory = CharacterDirectory::new();
        directory.replace(vec![character("bartender", "Marcus")], None);

        assert_eq!(
            directory.select(&CharacterId::from("ghost")),
            SelectOutcome::UnknownCharacter
        );
        assert_eq!(
            directory.select(&CharacterId::from("bartender")),
            SelectOutcome::Unchanged
        );
        assert_eq!(
            directory.selected_character().map(|c| c.name.as_str()),
            Some("Marcus")
        );
    }
}
