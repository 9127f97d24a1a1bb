use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// A closed set of labels. Serializes to the exact label the hosted models
/// are told to emit; parsing ignores case and treats spaces, underscores and hyphens alike.
pub trait Vocabulary: Sized + Copy + 'static {
    const ALL: &'static [Self];
    /// Extra spellings accepted by `parse`, never emitted.
    const ALIASES: &'static [(&'static str, Self)] = &[];

    fn as_str(self) -> &'static str;

    fn parse(raw: &str) -> Option<Self> {
        let wanted = normalize_label(raw);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|item| normalize_label(item.as_str()) == wanted)
            .or_else(|| {
                Self::ALIASES
                    .iter()
                    .find(|(alias, _)| normalize_label(alias) == wanted)
                    .map(|(_, item)| *item)
            })
    }

    /// Labels offered to the model; the `unknown` sentinel is never offered.
    fn choices() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .map(|item| item.as_str())
            .filter(|label| *label != "unknown")
            .collect()
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|ch| match ch {
            ' ' | '_' | '-' => '-',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }
        $(aliases { $($alias:literal => $target:ident),+ $(,)? })?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl Vocabulary for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];
            const ALIASES: &'static [(&'static str, Self)] = &[$($(($alias, $name::$target)),+)?];

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                <$name as Vocabulary>::parse(&raw).ok_or_else(|| {
                    de::Error::custom(format!(
                        "unsupported {} '{raw}'",
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

vocabulary!(BodyShape {
    Hourglass => "hourglass",
    Pear => "pear",
    Apple => "apple",
    Rectangle => "rectangle",
    InvertedTriangle => "inverted-triangle",
    Unknown => "unknown",
});

vocabulary!(SizeEstimate {
    Xs => "XS",
    S => "S",
    M => "M",
    L => "L",
    Xl => "XL",
    Xxl => "XXL",
    Unknown => "unknown",
} aliases {
    "extra small" => Xs,
    "small" => S,
    "medium" => M,
    "large" => L,
    "extra large" => Xl,
    "2XL" => Xxl,
    "extra extra large" => Xxl,
    "XX large" => Xxl,
});

vocabulary!(
    /// Garment category. `Unknown` only survives when the model gave nothing usable.
    Category {
        Top => "top",
        Bottom => "bottom",
        Dress => "dress",
        Outerwear => "outerwear",
        Footwear => "footwear",
        Accessory => "accessory",
        Swimwear => "swimwear",
        Activewear => "activewear",
        Formal => "formal",
        Underwear => "underwear",
        Unknown => "unknown",
    }
);

vocabulary!(Pattern {
    Solid => "solid",
    Striped => "striped",
    Plaid => "plaid",
    Floral => "floral",
    Geometric => "geometric",
    AnimalPrint => "animal print",
    Paisley => "paisley",
    Checkered => "checkered",
    Abstract => "abstract",
    Graphic => "graphic",
});

vocabulary!(Fit {
    Slim => "slim",
    Regular => "regular",
    Relaxed => "relaxed",
    Oversized => "oversized",
    Fitted => "fitted",
    Tailored => "tailored",
    Loose => "loose",
});

vocabulary!(Style {
    Casual => "casual",
    Formal => "formal",
    BusinessCasual => "business casual",
    Streetwear => "streetwear",
    Bohemian => "bohemian",
    Minimalist => "minimalist",
    Vintage => "vintage",
    Athletic => "athletic",
    Preppy => "preppy",
    Edgy => "edgy",
});
