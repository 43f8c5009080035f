/// Tests for the output slots

use super::*;
use slotmap::SlotMap;

fn keys(count: usize) -> Vec<TargetKey> {
    let mut map: SlotMap<TargetKey, ()> = SlotMap::with_key();
    (0..count).map(|_| map.insert(())).collect()
}

#[test]
fn test_slot_mapping() {
    assert_eq!(OutputSlot::new(Screen::Top, Side::Left), OutputSlot::TopLeft);
    assert_eq!(OutputSlot::new(Screen::Top, Side::Right), OutputSlot::TopRight);
    assert_eq!(OutputSlot::new(Screen::Bottom, Side::Left), OutputSlot::Bottom);
    assert_eq!(OutputSlot::new(Screen::Bottom, Side::Right), OutputSlot::Bottom);
}

#[test]
fn test_set_reports_displaced_target() {
    let k = keys(2);
    let mut slots = OutputSlots::new();

    assert_eq!(slots.set(OutputSlot::TopLeft, k[0]), None);
    assert_eq!(slots.set(OutputSlot::TopLeft, k[0]), None);
    assert_eq!(slots.set(OutputSlot::TopLeft, k[1]), Some(k[0]));
    assert_eq!(slots.get(OutputSlot::TopLeft), Some(k[1]));
}

#[test]
fn test_find_and_take() {
    let k = keys(2);
    let mut slots = OutputSlots::new();
    slots.set(OutputSlot::Bottom, k[1]);

    assert_eq!(slots.find(k[1]), Some(OutputSlot::Bottom));
    assert_eq!(slots.find(k[0]), None);
    assert_eq!(slots.take(OutputSlot::Bottom), Some(k[1]));
    assert_eq!(slots.find(k[1]), None);
}
