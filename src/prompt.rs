//! Instruction validation and prompt construction.
//!
//! Staging instructions reference the uploaded photo with a bracketed index
//! marker (`[1]`); prompt builders produce instructions that already carry
//! the marker so they pass the grounding gate.

use std::path::Path;

/// Marker that associates an instruction with the reference photo.
pub const REFERENCE_MARKER: &str = "[1]";

/// Furnishing styles offered by the generation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Clean lines, neutral palette.
    Modern,
    /// Linen, chunky oak, black metal accents.
    Farmhouse,
    /// Teak, tapered legs, saturated accents.
    MidCenturyModern,
    /// Leather, steel shelving, reclaimed wood.
    Industrial,
    /// Layered textiles, rattan, plants.
    Bohemian,
    /// Light ash wood, grey fabric, geometric rugs.
    Scandinavian,
    /// Whites and blues, natural fiber rugs.
    Coastal,
}

impl Style {
    /// All styles, in menu order.
    pub const ALL: [Style; 7] = [
        Style::Modern,
        Style::Farmhouse,
        Style::MidCenturyModern,
        Style::Industrial,
        Style::Bohemian,
        Style::Scandinavian,
        Style::Coastal,
    ];

    /// Display name as shown in the selection menu.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modern => "Modern",
            Self::Farmhouse => "Farmhouse",
            Self::MidCenturyModern => "Mid-Century Modern",
            Self::Industrial => "Industrial",
            Self::Bohemian => "Bohemian",
            Self::Scandinavian => "Scandinavian",
            Self::Coastal => "Coastal",
        }
    }

    /// One-line visual vocabulary for this style, kept short to avoid
    /// crowding the prompt.
    fn aesthetic(&self) -> &'static str {
        match self {
            Self::Modern => {
                "Furniture style: Modern. Visuals: low-profile sofas, glass and \
                 matte black tables, neutral wool rugs, minimal decor."
            }
            Self::Farmhouse => {
                "Furniture style: Modern Farmhouse. Visuals: linen slipcovered \
                 sofas, chunky oak tables, black metal accents, cream wool rugs, \
                 eucalyptus greenery."
            }
            Self::MidCenturyModern => {
                "Furniture style: Mid-Century Modern. Visuals: teak sideboards, \
                 tapered-leg chairs, mustard and teal accents, starburst decor."
            }
            Self::Industrial => {
                "Furniture style: Industrial Chic. Visuals: cognac leather sofas, \
                 steel shelving, reclaimed wood tables, cowhide rugs."
            }
            Self::Bohemian => {
                "Furniture style: Bohemian. Visuals: layered patterned textiles, \
                 rattan chairs, macrame wall hangings, abundant plants."
            }
            Self::Scandinavian => {
                "Furniture style: Scandi-Minimalist. Visuals: light ash wood, \
                 grey fabric sofas, nesting tables, geometric wool rugs."
            }
            Self::Coastal => {
                "Furniture style: Coastal. Visuals: white slipcovered seating, \
                 driftwood tables, blue striped pillows, natural fiber rugs."
            }
        }
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Room types offered by the generation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomType {
    /// Main living space.
    LivingRoom,
    /// Primary bedroom.
    MainBedroom,
    /// Secondary bedroom.
    GuestBedroom,
    /// Dining room.
    DiningRoom,
    /// Kitchen.
    Kitchen,
    /// Home office.
    Office,
    /// Entryway.
    Entryway,
    /// Finished basement.
    Basement,
}

impl RoomType {
    /// All room types, in menu order.
    pub const ALL: [RoomType; 8] = [
        RoomType::LivingRoom,
        RoomType::MainBedroom,
        RoomType::GuestBedroom,
        RoomType::DiningRoom,
        RoomType::Kitchen,
        RoomType::Office,
        RoomType::Entryway,
        RoomType::Basement,
    ];

    /// Display name as shown in the selection menu.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LivingRoom => "Living Room",
            Self::MainBedroom => "Main Bedroom",
            Self::GuestBedroom => "Guest Bedroom",
            Self::DiningRoom => "Dining Room",
            Self::Kitchen => "Kitchen",
            Self::Office => "Office",
            Self::Entryway => "Entryway",
            Self::Basement => "Basement",
        }
    }

    /// Placement guidance for the staging prompt. Simple declarative
    /// placement works better than spatial zoning language.
    fn placement(&self) -> &'static str {
        match self {
            Self::LivingRoom => {
                "PLACEMENT: Arrange a conversation area with a sofa and chairs \
                 around a central rug."
            }
            Self::MainBedroom | Self::GuestBedroom => {
                "PLACEMENT: Place a bed centrally with nightstands. Keep low to \
                 respect ceiling height."
            }
            Self::DiningRoom => {
                "PLACEMENT: Place a dining table and chairs in the center of the \
                 room."
            }
            Self::Kitchen => {
                "PLACEMENT: Add counter stools and tasteful counter styling only."
            }
            Self::Office => {
                "PLACEMENT: Place a desk facing the window with a chair and a \
                 bookshelf against a wall."
            }
            Self::Entryway => {
                "PLACEMENT: Place a narrow console table against the wall with a \
                 mirror above it."
            }
            Self::Basement => {
                "PLACEMENT: Place a sofa and coffee table in the center. Add a TV \
                 stand against the far wall."
            }
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builds a prompt for prompt-only generation of a furnished room.
pub fn generation_prompt(style: Style, room: RoomType) -> String {
    format!(
        "Generate a photorealistic image of a {} {}. Ensure the room looks \
         professionally designed and well-lit.",
        style, room
    )
}

/// Builds a grounded staging instruction for the editing capability.
///
/// The photo is referenced by the `[1]` marker. Walls, ceiling, windows, and
/// flooring are pinned as immutable so the model only inserts furniture.
pub fn staging_prompt(style: Style, room: RoomType, user_note: &str) -> String {
    let mut prompt = format!(
        "TASK: Inpaint realistic 3D furniture into the empty floor space of the \
         room shown in {}.\n\
         CONSTRAINT: The existing walls, ceiling, windows, and flooring are \
         FROZEN. Do not change them.\n\
         AESTHETIC: {}\n\
         {}",
        REFERENCE_MARKER,
        style.aesthetic(),
        room.placement(),
    );

    let note = user_note.trim();
    if !note.is_empty() {
        prompt.push_str(&format!("\nUSER NOTE: Include {} if it fits naturally.", note));
    }

    prompt.push_str(
        "\nSTRICT NEGATIVE CONSTRAINTS:\n\
         - NO removing or moving walls, bulkheads, or soffits.\n\
         - NO changing the ceiling or flooring material.\n\
         - NO changing windows or views.\n\
         - NO construction or remodeling.",
    );

    prompt
}

/// Lowercases a menu label and replaces spaces for use in a filename.
fn slug(label: &str) -> String {
    label.to_lowercase().replace(' ', "_")
}

/// Download filename for a generated image: `generated_<style>_<room>.png`.
pub fn generated_filename(style: Style, room: RoomType) -> String {
    format!("generated_{}_{}.png", slug(style.as_str()), slug(room.as_str()))
}

/// Download filename for an edited image: `edited_<originalname>.png`.
pub fn edited_filename(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    format!("edited_{}.png", stem)
}
