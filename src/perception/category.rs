use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Raw object classes emitted by the perception stack, plus the synthetic
/// MOTION class produced by the motion detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ObjectType {
    Person,
    Bicycle,
    Car,
    Motorcycle,
    Airplane,
    Bus,
    Train,
    Truck,
    Boat,
    TrafficLight,
    FireHydrant,
    StopSign,
    ParkingMeter,
    Bench,
    Bird,
    Cat,
    Dog,
    Horse,
    Sheep,
    Cow,
    Elephant,
    Bear,
    Zebra,
    Giraffe,
    Backpack,
    Umbrella,
    Handbag,
    Tie,
    Suitcase,
    Frisbee,
    Skis,
    Snowboard,
    SportsBall,
    Kite,
    BaseballBat,
    BaseballGlove,
    Skateboard,
    Surfboard,
    TennisRacket,
    Bottle,
    WineGlass,
    Cup,
    Fork,
    Knife,
    Spoon,
    Bowl,
    Banana,
    Apple,
    Sandwich,
    Orange,
    Broccoli,
    Carrot,
    HotDog,
    Pizza,
    Donut,
    Cake,
    Chair,
    Couch,
    PottedPlant,
    Bed,
    DiningTable,
    Toilet,
    Tv,
    Laptop,
    Mouse,
    Remote,
    Keyboard,
    CellPhone,
    Microwave,
    Oven,
    Toaster,
    Sink,
    Refrigerator,
    Book,
    Clock,
    Vase,
    Scissors,
    TeddyBear,
    HairDrier,
    Toothbrush,
    Motion,
}

impl ObjectType {
    /// Map a raw class to its 5-way reporting category. Total: classes
    /// without an explicit mapping fall into [`ObjectCategory::Unknown`].
    pub fn category(self) -> ObjectCategory {
        match self {
            ObjectType::Person => ObjectCategory::Person,
            ObjectType::Bicycle
            | ObjectType::Car
            | ObjectType::Motorcycle
            | ObjectType::Airplane
            | ObjectType::Bus
            | ObjectType::Train
            | ObjectType::Truck
            | ObjectType::Boat => ObjectCategory::Vehicle,
            ObjectType::Bird
            | ObjectType::Cat
            | ObjectType::Dog
            | ObjectType::Horse
            | ObjectType::Sheep
            | ObjectType::Cow
            | ObjectType::Elephant
            | ObjectType::Bear
            | ObjectType::Zebra
            | ObjectType::Giraffe => ObjectCategory::Animal,
            ObjectType::Motion => ObjectCategory::Motion,
            _ => ObjectCategory::Unknown,
        }
    }

    pub fn all() -> &'static [ObjectType] {
        use ObjectType::*;
        &[
            Person, Bicycle, Car, Motorcycle, Airplane, Bus, Train, Truck, Boat, TrafficLight,
            FireHydrant, StopSign, ParkingMeter, Bench, Bird, Cat, Dog, Horse, Sheep, Cow,
            Elephant, Bear, Zebra, Giraffe, Backpack, Umbrella, Handbag, Tie, Suitcase, Frisbee,
            Skis, Snowboard, SportsBall, Kite, BaseballBat, BaseballGlove, Skateboard, Surfboard,
            TennisRacket, Bottle, WineGlass, Cup, Fork, Knife, Spoon, Bowl, Banana, Apple,
            Sandwich, Orange, Broccoli, Carrot, HotDog, Pizza, Donut, Cake, Chair, Couch,
            PottedPlant, Bed, DiningTable, Toilet, Tv, Laptop, Mouse, Remote, Keyboard, CellPhone,
            Microwave, Oven, Toaster, Sink, Refrigerator, Book, Clock, Vase, Scissors, TeddyBear,
            HairDrier, Toothbrush, Motion,
        ]
    }
}

/// Reporting category for aggregated activity. Variants are declared in the
/// lexicographic order of their names so the derived ordering matches the
/// string ordering used by interval queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectCategory {
    Animal,
    Motion,
    Person,
    Unknown,
    Vehicle,
}

impl ObjectCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectCategory::Animal => "ANIMAL",
            ObjectCategory::Motion => "MOTION",
            ObjectCategory::Person => "PERSON",
            ObjectCategory::Unknown => "UNKNOWN",
            ObjectCategory::Vehicle => "VEHICLE",
        }
    }
}

impl Display for ObjectCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_maps_to_exactly_one_category() {
        for object_type in ObjectType::all() {
            // category() is a total match; this exercises every variant
            let _ = object_type.category();
        }
    }

    #[test]
    fn explicit_mappings() {
        assert_eq!(ObjectType::Person.category(), ObjectCategory::Person);
        assert_eq!(ObjectType::Truck.category(), ObjectCategory::Vehicle);
        assert_eq!(ObjectType::Bicycle.category(), ObjectCategory::Vehicle);
        assert_eq!(ObjectType::Dog.category(), ObjectCategory::Animal);
        assert_eq!(ObjectType::Motion.category(), ObjectCategory::Motion);
    }

    #[test]
    fn unmapped_types_are_unknown() {
        assert_eq!(ObjectType::Bench.category(), ObjectCategory::Unknown);
        assert_eq!(ObjectType::TeddyBear.category(), ObjectCategory::Unknown);
        assert_eq!(ObjectType::Toaster.category(), ObjectCategory::Unknown);
    }

    #[test]
    fn category_order_matches_string_order() {
        let mut categories = vec![
            ObjectCategory::Vehicle,
            ObjectCategory::Person,
            ObjectCategory::Animal,
            ObjectCategory::Unknown,
            ObjectCategory::Motion,
        ];
        categories.sort();
        let strings: Vec<_> = categories.iter().map(|c| c.as_str()).collect();
        let mut sorted_strings = strings.clone();
        sorted_strings.sort();
        assert_eq!(strings, sorted_strings);
    }
}
