//! Category-specific overlay rendering
//!
//! Rendering is split in two phases. [`plan`] turns one frame's detections into
//! an [`OverlayPlan`] (which boxes, colors and labels to draw) without touching
//! pixels, and [`draw`] paints a plan onto a frame. Each [`Category`] has its
//! own policy; thresholds are strict `confidence > threshold` comparisons.

use crate::image_utils::{
    blend_rect, draw_corner_rect, draw_rect, draw_text, text_size, GLYPH_HEIGHT,
};
use crate::types::{BoundingBox, Category, Detection};
use image::{Rgb, RgbImage};
use rayon::prelude::*;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);
const UNKNOWN_VEHICLE: Rgb<u8> = Rgb([128, 128, 128]);

/// Glyph scale for box labels and counters
pub const LABEL_SCALE: u32 = 2;
const INDICATOR_SCALE: u32 = 2;
const INDICATOR_MARGIN: i32 = 10;
const INDICATOR_ALPHA: f32 = 0.3;

const SMOKING_CLASS_CIGARETTE: u32 = 0;
const SMOKING_CLASS_FACE: u32 = 1;
const SMOKING_CLASS_SMOKING: u32 = 2;

/// Per-category confidence thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub crowd: f32,
    pub fire: f32,
    pub smoking: f32,
    pub vehicle: f32,
    pub weapon: f32,
    /// Smoking boxes above this score can suppress overlapping faces
    pub smoking_discovery: f32,
    /// A face overlapping a discovered smoking box by more than this IoU is hidden
    pub face_suppression_iou: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            crowd: 0.3,
            fire: 0.2,
            smoking: 0.2,
            vehicle: 0.6,
            weapon: 0.2,
            smoking_discovery: 0.5,
            face_suppression_iou: 0.3,
        }
    }
}

impl Thresholds {
    pub fn get(&self, category: Category) -> f32 {
        match category {
            Category::Crowd => self.crowd,
            Category::Fire => self.fire,
            Category::Smoking => self.smoking,
            Category::Vehicle => self.vehicle,
            Category::Weapon => self.weapon,
        }
    }

    pub fn set(&mut self, category: Category, value: f32) {
        match category {
            Category::Crowd => self.crowd = value,
            Category::Fire => self.fire = value,
            Category::Smoking => self.smoking = value,
            Category::Vehicle => self.vehicle = value,
            Category::Weapon => self.weapon = value,
        }
    }
}

/// Text placed on the frame, anchored at its bottom-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: Rgb<u8>,
    pub background: Option<Rgb<u8>>,
}

impl Label {
    fn new(text: impl Into<String>, x: i32, y: i32, color: Rgb<u8>) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            color,
            background: None,
        }
    }

    fn on(mut self, background: Rgb<u8>) -> Self {
        self.background = Some(background);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxStyle {
    Plain,
    /// Thin outline with thick brackets of `length` pixels on each corner
    Corner {
        corner_color: Rgb<u8>,
        length: i32,
        thickness: i32,
    },
}

/// One box the policy decided to draw
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub color: Rgb<u8>,
    pub thickness: i32,
    pub style: BoxStyle,
    pub label: Option<Label>,
}

/// Everything a category policy wants drawn for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlan {
    pub category: Category,
    pub boxes: Vec<OverlayBox>,
    /// Frame-level text such as the crowd counter
    pub texts: Vec<Label>,
}

impl OverlayPlan {
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            boxes: Vec::new(),
            texts: Vec::new(),
        }
    }

    /// Number of boxes that will be drawn
    pub fn detection_count(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.texts.is_empty()
    }
}

/// Box color for a vehicle class name; unknown names render gray
pub fn vehicle_color(class_name: &str) -> Rgb<u8> {
    match class_name.to_lowercase().as_str() {
        "car" => Rgb([0, 255, 0]),
        "big bus" => Rgb([0, 50, 255]),
        "bus-l-" => Rgb([0, 150, 255]),
        "bus-s-" => Rgb([0, 200, 255]),
        "small bus" => Rgb([0, 250, 255]),
        "truck-xl-" => Rgb([255, 0, 0]),
        "big truck" => Rgb([220, 0, 0]),
        "truck-l-" => Rgb([190, 0, 0]),
        "mid truck" => Rgb([180, 50, 0]),
        "truck-m-" => Rgb([170, 70, 0]),
        "small truck" => Rgb([160, 90, 20]),
        "truck-s-" => Rgb([150, 110, 40]),
        _ => UNKNOWN_VEHICLE,
    }
}

fn percent(confidence: f32) -> f32 {
    confidence * 100.0
}

/// Keep detections above `threshold` and map each through `build`, preserving order
fn collect_boxes<F>(detections: &[Detection], threshold: f32, build: F) -> Vec<OverlayBox>
where
    F: Fn(&Detection) -> Option<OverlayBox> + Sync,
{
    detections
        .par_iter()
        .filter(|det| det.confidence > threshold)
        .filter_map(|det| {
            if !det.bbox.is_valid() {
                log::warn!("Invalid bbox {:?} for '{}', skipping", det.bbox, det.class_name);
                return None;
            }
            build(det)
        })
        .collect()
}

fn plain(det: &Detection, color: Rgb<u8>, thickness: i32, label: Option<Label>) -> OverlayBox {
    OverlayBox {
        bbox: det.bbox,
        class_id: det.class_id,
        color,
        thickness,
        style: BoxStyle::Plain,
        label,
    }
}

/// Decide what to draw for one frame's detections
pub fn plan(category: Category, detections: &[Detection], thresholds: &Thresholds) -> OverlayPlan {
    let mut overlay = OverlayPlan::empty(category);
    let threshold = thresholds.get(category);

    match category {
        Category::Crowd => {
            let people = collect_boxes(detections, threshold, |det| {
                Some(plain(det, BLUE, 1, None))
            });
            let count = detections
                .iter()
                .filter(|det| det.confidence > threshold)
                .count();

            overlay.boxes = people
                .into_iter()
                .enumerate()
                .map(|(i, mut person)| {
                    let (x1, y1, _, _) = person.bbox.to_pixels();
                    person.label = Some(Label::new(
                        (i + 1).to_string(),
                        x1.saturating_add(10),
                        y1.saturating_add(20),
                        WHITE,
                    ));
                    person
                })
                .collect();
            overlay
                .texts
                .push(Label::new(format!("People Count: {}", count), 20, 40, WHITE).on(BLACK));
        }

        Category::Fire => {
            overlay.boxes = collect_boxes(detections, threshold, |det| {
                let (x1, y1, _, _) = det.bbox.to_pixels();
                let text = format!(
                    "{} {:.1}%",
                    det.class_name.to_uppercase(),
                    percent(det.confidence)
                );
                Some(OverlayBox {
                    bbox: det.bbox,
                    class_id: det.class_id,
                    color: ORANGE,
                    thickness: 1,
                    style: BoxStyle::Corner {
                        corner_color: RED,
                        length: 5,
                        thickness: 3,
                    },
                    label: Some(Label::new(text, x1, y1.saturating_sub(10), WHITE).on(RED)),
                })
            });
        }

        Category::Smoking => {
            // Pass 1: confidently discovered smoking regions
            let smoking_regions: Vec<BoundingBox> = detections
                .iter()
                .filter(|det| {
                    det.class_id == SMOKING_CLASS_SMOKING
                        && det.confidence > thresholds.smoking_discovery
                })
                .map(|det| det.bbox)
                .collect();

            // Pass 2: draw, hiding faces already covered by a smoking region
            overlay.boxes = collect_boxes(detections, threshold, |det| {
                let (x1, y1, _, _) = det.bbox.to_pixels();
                let text = format!("{} {:.2}%", det.class_name, percent(det.confidence));
                let anchor_y = y1.saturating_sub(10);
                let (color, thickness, label) = match det.class_id {
                    SMOKING_CLASS_CIGARETTE => {
                        (ORANGE, 1, Label::new(text, x1, anchor_y, WHITE).on(ORANGE))
                    }
                    SMOKING_CLASS_SMOKING => (RED, 2, Label::new(text, x1, anchor_y, WHITE).on(RED)),
                    SMOKING_CLASS_FACE => {
                        let suppressed = smoking_regions
                            .iter()
                            .any(|region| det.bbox.iou(region) > thresholds.face_suppression_iou);
                        if suppressed {
                            log::debug!("Face at {:?} suppressed by smoking region", det.bbox);
                            return None;
                        }
                        (BLACK, 1, Label::new(text, x1, anchor_y, BLACK))
                    }
                    _ => return None,
                };
                Some(plain(det, color, thickness, Some(label)))
            });
        }

        Category::Vehicle => {
            overlay.boxes = collect_boxes(detections, threshold, |det| {
                let (x1, y1, _, _) = det.bbox.to_pixels();
                let color = vehicle_color(&det.class_name);
                let text = format!("{} {:.2}%", det.class_name, percent(det.confidence));
                Some(plain(
                    det,
                    color,
                    2,
                    Some(Label::new(text, x1, y1.saturating_sub(10).max(20), WHITE).on(color)),
                ))
            });
        }

        Category::Weapon => {
            overlay.boxes = collect_boxes(detections, threshold, |det| {
                let (x1, y1, _, _) = det.bbox.to_pixels();
                let text = format!("GUN {:.2}%", percent(det.confidence));
                let label = Label::new(text, x1, y1.saturating_sub(10), WHITE).on(RED);
                Some(plain(det, RED, 1, Some(label)))
            });
        }
    }

    overlay
}

fn draw_label(frame: &mut RgbImage, label: &Label) {
    let top = label.y.saturating_sub(GLYPH_HEIGHT * LABEL_SCALE as i32);
    draw_text(
        frame,
        &label.text,
        label.x,
        top,
        label.color,
        label.background,
        LABEL_SCALE,
    );
}

/// Paint a plan onto a frame
pub fn draw(frame: &mut RgbImage, overlay: &OverlayPlan) {
    for item in &overlay.boxes {
        let (x1, y1, x2, y2) = item.bbox.to_pixels();
        match item.style {
            BoxStyle::Plain => draw_rect(frame, x1, y1, x2, y2, item.color, item.thickness),
            BoxStyle::Corner {
                corner_color,
                length,
                thickness,
            } => draw_corner_rect(
                frame,
                x1,
                y1,
                x2,
                y2,
                item.color,
                corner_color,
                length,
                thickness,
            ),
        }
        if let Some(label) = &item.label {
            draw_label(frame, label);
        }
    }

    for text in &overlay.texts {
        draw_label(frame, text);
    }
}

/// Plan and draw in one step, returning the plan that was drawn
pub fn annotate(
    category: Category,
    frame: &mut RgbImage,
    detections: &[Detection],
    thresholds: &Thresholds,
) -> OverlayPlan {
    let overlay = plan(category, detections, thresholds);
    draw(frame, &overlay);
    overlay
}

/// Composite the "ACTIVATED: <name>" panel in the bottom-right corner
pub fn draw_indicator(frame: &mut RgbImage, category: Category) {
    let text = format!("ACTIVATED: {}", category.display_name());
    let color = category.indicator_color();

    let (text_w, text_h) = text_size(&text, INDICATOR_SCALE);
    let panel_w = text_w + 2 * INDICATOR_MARGIN as u32;
    let panel_h = text_h + 2 * INDICATOR_MARGIN as u32;
    let x = frame.width() as i32 - panel_w as i32 - INDICATOR_MARGIN;
    let y = frame.height() as i32 - panel_h as i32 - INDICATOR_MARGIN;

    blend_rect(frame, x, y, panel_w, panel_h, color, INDICATOR_ALPHA);
    draw_rect(
        frame,
        x,
        y,
        x + panel_w as i32,
        y + panel_h as i32,
        color,
        2,
    );
    draw_text(
        frame,
        &text,
        x + INDICATOR_MARGIN,
        y + INDICATOR_MARGIN,
        WHITE,
        None,
        INDICATOR_SCALE,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, name: &str, confidence: f32, bbox: (f32, f32, f32, f32)) -> Detection {
        Detection::new(
            class_id,
            name,
            confidence,
            BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
        )
    }

    #[test]
    fn test_crowd_count_and_ordinals() {
        let detections = vec![
            det(0, "person", 0.9, (10.0, 10.0, 50.0, 90.0)),
            det(0, "person", 0.25, (60.0, 10.0, 90.0, 90.0)),
            det(0, "person", 0.31, (100.0, 10.0, 140.0, 90.0)),
            det(0, "person", 0.3, (150.0, 10.0, 190.0, 90.0)),
        ];
        let overlay = plan(Category::Crowd, &detections, &Thresholds::default());

        assert_eq!(overlay.detection_count(), 2);
        assert_eq!(overlay.texts.len(), 1);
        assert_eq!(overlay.texts[0].text, "People Count: 2");
        assert_eq!(overlay.texts[0].background, Some(BLACK));

        let labels: Vec<_> = overlay
            .boxes
            .iter()
            .map(|b| b.label.as_ref().map(|l| (l.text.clone(), l.x, l.y)))
            .collect();
        assert_eq!(
            labels,
            vec![
                Some(("1".to_string(), 20, 30)),
                Some(("2".to_string(), 110, 30)),
            ]
        );
        assert!(overlay.boxes.iter().all(|b| b.color == BLUE && b.thickness == 1));
        assert!(overlay
            .boxes
            .iter()
            .all(|b| b.label.as_ref().map(|l| (l.color, l.background)) == Some((WHITE, None))));
    }

    #[test]
    fn test_crowd_zero_count_still_shown() {
        let overlay = plan(Category::Crowd, &[], &Thresholds::default());
        assert_eq!(overlay.texts[0].text, "People Count: 0");
        assert_eq!(overlay.detection_count(), 0);
    }

    #[test]
    fn test_fire_label_and_style() {
        let detections = vec![
            det(0, "fire", 0.875, (20.0, 30.0, 80.0, 90.0)),
            det(1, "smoke", 0.2, (0.0, 0.0, 10.0, 10.0)),
        ];
        let overlay = plan(Category::Fire, &detections, &Thresholds::default());

        assert_eq!(overlay.detection_count(), 1);
        let fire = &overlay.boxes[0];
        assert_eq!(
            fire.style,
            BoxStyle::Corner {
                corner_color: RED,
                length: 5,
                thickness: 3
            }
        );
        let label = fire.label.as_ref().unwrap();
        assert_eq!(label.text, "FIRE 87.5%");
        assert_eq!((label.x, label.y), (20, 20));
        assert_eq!(label.background, Some(RED));
        assert_eq!(label.color, WHITE);
    }

    #[test]
    fn test_smoking_face_suppressed_by_overlap() {
        let detections = vec![
            det(2, "smoking", 0.8, (0.0, 0.0, 10.0, 10.0)),
            // IoU with the smoking box is 1.0
            det(1, "face", 0.9, (0.0, 0.0, 10.0, 10.0)),
            det(0, "cigarette", 0.4, (3.0, 3.0, 6.0, 5.0)),
        ];
        let overlay = plan(Category::Smoking, &detections, &Thresholds::default());

        let classes: Vec<u32> = overlay.boxes.iter().map(|b| b.class_id).collect();
        assert_eq!(classes, vec![2, 0]);

        let smoking = &overlay.boxes[0];
        assert_eq!((smoking.color, smoking.thickness), (RED, 2));
        assert_eq!(smoking.label.as_ref().unwrap().text, "smoking 80.00%");
        let smoking_label = smoking.label.as_ref().unwrap();
        assert_eq!((smoking_label.color, smoking_label.background), (WHITE, Some(RED)));

        let cigarette = &overlay.boxes[1];
        assert_eq!((cigarette.color, cigarette.thickness), (ORANGE, 1));
        let cigarette_label = cigarette.label.as_ref().unwrap();
        assert_eq!(
            (cigarette_label.color, cigarette_label.background),
            (WHITE, Some(ORANGE))
        );
    }

    #[test]
    fn test_smoking_face_kept_with_small_overlap() {
        // IoU = 25 / 175 ~= 0.143
        let detections = vec![
            det(2, "smoking", 0.8, (0.0, 0.0, 10.0, 10.0)),
            det(1, "face", 0.9, (5.0, 5.0, 15.0, 15.0)),
        ];
        let overlay = plan(Category::Smoking, &detections, &Thresholds::default());

        assert_eq!(overlay.detection_count(), 2);
        let face = &overlay.boxes[1];
        assert_eq!((face.color, face.thickness), (BLACK, 1));
        let face_label = face.label.as_ref().unwrap();
        assert_eq!(face_label.text, "face 90.00%");
        assert_eq!((face_label.color, face_label.background), (BLACK, None));
    }

    #[test]
    fn test_smoking_weak_region_does_not_suppress() {
        // Smoking box at 0.4 is drawn but is below the discovery threshold
        let detections = vec![
            det(2, "smoking", 0.4, (0.0, 0.0, 10.0, 10.0)),
            det(1, "face", 0.9, (0.0, 0.0, 10.0, 10.0)),
            det(7, "unknown", 0.9, (0.0, 0.0, 10.0, 10.0)),
        ];
        let overlay = plan(Category::Smoking, &detections, &Thresholds::default());
        let classes: Vec<u32> = overlay.boxes.iter().map(|b| b.class_id).collect();
        assert_eq!(classes, vec![2, 1]);
    }

    #[test]
    fn test_vehicle_palette_and_label_offset() {
        let detections = vec![
            det(0, "car", 0.9, (10.0, 5.0, 60.0, 40.0)),
            det(5, "Truck-XL-", 0.7, (10.0, 100.0, 60.0, 140.0)),
            det(12, "tractor", 0.65, (100.0, 100.0, 160.0, 140.0)),
            det(0, "car", 0.6, (200.0, 100.0, 260.0, 140.0)),
        ];
        let overlay = plan(Category::Vehicle, &detections, &Thresholds::default());

        assert_eq!(overlay.detection_count(), 3);
        assert_eq!(overlay.boxes[0].color, Rgb([0, 255, 0]));
        assert_eq!(overlay.boxes[1].color, Rgb([255, 0, 0]));
        assert_eq!(overlay.boxes[2].color, UNKNOWN_VEHICLE);
        assert!(overlay.boxes.iter().all(|b| b.thickness == 2));

        let car_label = overlay.boxes[0].label.as_ref().unwrap();
        assert_eq!(car_label.text, "car 90.00%");
        assert_eq!(car_label.y, 20);
        assert_eq!((car_label.color, car_label.background), (WHITE, Some(Rgb([0, 255, 0]))));
        assert_eq!(overlay.boxes[1].label.as_ref().unwrap().y, 90);
    }

    #[test]
    fn test_weapon_label_ignores_class_name() {
        let detections = vec![det(3, "pistol", 0.5, (10.0, 20.0, 30.0, 40.0))];
        let overlay = plan(Category::Weapon, &detections, &Thresholds::default());

        let weapon = &overlay.boxes[0];
        assert_eq!((weapon.color, weapon.thickness), (RED, 1));
        let label = weapon.label.as_ref().unwrap();
        assert_eq!(label.text, "GUN 50.00%");
        assert_eq!((label.color, label.background), (WHITE, Some(RED)));
    }

    #[test]
    fn test_below_threshold_never_drawn() {
        let thresholds = Thresholds::default();
        for category in Category::ALL {
            let limit = thresholds.get(category);
            let detections = vec![
                det(0, "person", limit, (10.0, 10.0, 50.0, 50.0)),
                det(2, "smoking", limit - 0.05, (10.0, 10.0, 50.0, 50.0)),
            ];
            let overlay = plan(category, &detections, &thresholds);
            assert_eq!(overlay.detection_count(), 0, "category {}", category);

            let mut frame = RgbImage::new(100, 100);
            draw(&mut frame, &overlay);
            // Only the crowd counter may paint, in rows 26..42 under its baseline at y = 40
            let untouched = frame
                .enumerate_pixels()
                .filter(|(_, y, _)| category != Category::Crowd || !(26..42).contains(y))
                .all(|(_, _, p)| *p == BLACK);
            assert!(untouched, "category {}", category);
        }
    }

    #[test]
    fn test_far_out_of_frame_boxes_do_not_panic() {
        let thresholds = Thresholds::default();
        let huge = [
            (-3.0e9, 0.0, 3.0e9, 10.0),
            (0.0, -3.0e9, 10.0, 3.0e9),
            (-3.0e9, -3.0e9, -2.0e9, -2.0e9),
            (2.0e9, 2.0e9, 3.0e9, 3.0e9),
            (f32::MIN, f32::MIN, f32::MAX, f32::MAX),
        ];
        for category in Category::ALL {
            let detections: Vec<Detection> = huge
                .iter()
                .map(|&bbox| det(2, "car", 0.99, bbox))
                .collect();
            let mut frame = RgbImage::new(64, 48);
            let overlay = annotate(category, &mut frame, &detections, &thresholds);
            assert_eq!(overlay.detection_count(), detections.len(), "category {}", category);
        }

        // The spanning weapon box still shows its visible bottom edge
        let mut frame = RgbImage::new(64, 48);
        let detections = vec![det(0, "gun", 0.9, (-3.0e9, 0.0, 3.0e9, 10.0))];
        annotate(Category::Weapon, &mut frame, &detections, &thresholds);
        assert_eq!(*frame.get_pixel(32, 9), RED);
    }

    #[test]
    fn test_invalid_boxes_skipped() {
        let detections = vec![det(0, "gun", 0.9, (50.0, 50.0, 40.0, 60.0))];
        let overlay = plan(Category::Weapon, &detections, &Thresholds::default());
        assert_eq!(overlay.detection_count(), 0);
    }

    #[test]
    fn test_annotate_draws_boxes_clipped() {
        let mut frame = RgbImage::new(64, 48);
        let detections = vec![det(0, "gun", 0.9, (-20.0, 10.0, 30.0, 200.0))];
        let overlay = annotate(Category::Weapon, &mut frame, &detections, &Thresholds::default());

        assert_eq!(overlay.detection_count(), 1);
        // Right edge of the box at x = 29
        assert_eq!(*frame.get_pixel(29, 30), RED);
    }

    #[test]
    fn test_indicator_blends_bottom_right() {
        let mut frame = RgbImage::from_pixel(640, 360, Rgb([100, 100, 100]));
        draw_indicator(&mut frame, Category::Crowd);

        // Top-left corner stays untouched
        assert_eq!(*frame.get_pixel(0, 0), Rgb([100, 100, 100]));
        // Margin below the panel untouched
        assert_eq!(*frame.get_pixel(639, 359), Rgb([100, 100, 100]));

        // Panel interior between border and text is blended with green
        let text = format!("ACTIVATED: {}", Category::Crowd.display_name());
        let (tw, th) = text_size(&text, INDICATOR_SCALE);
        let panel_h = th as i32 + 20;
        let panel_w = tw as i32 + 20;
        let x = 640 - panel_w - 10;
        let y = 360 - panel_h - 10;
        assert_eq!(*frame.get_pixel((x + 4) as u32, (y + 4) as u32), Rgb([70, 147, 70]));
        // Border in the category color
        assert_eq!(*frame.get_pixel((x + 20) as u32, y as u32), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_indicator_on_tiny_frame() {
        let mut frame = RgbImage::new(16, 16);
        draw_indicator(&mut frame, Category::Smoking);
    }
}
