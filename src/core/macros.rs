//! 核心宏定义
//!
//! 提供统一的宏来减少配置结构体的样板代码

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use particle_pipeline::impl_default;
///
/// struct MyConfig {
///     max_batch_size: usize,
///     label: String,
/// }
///
/// impl_default!(MyConfig {
///     max_batch_size: 1000,
///     label: String::new(),
/// });
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

/// 把数值夹在 `[min, max]` 内，同时把 NaN 归为 `min`
///
/// 画质因子、重要性分数等都需要这种"永不产生 NaN"的夹取。
#[macro_export]
macro_rules! clamp_finite {
    ($value:expr, $min:expr, $max:expr) => {{
        let v: f32 = $value;
        if v.is_nan() {
            $min
        } else {
            v.clamp($min, $max)
        }
    }};
}

#[cfg(test)]
mod tests {

    struct TestConfig {
        field1: u32,
        field2: String,
    }

    impl_default!(TestConfig {
        field1: 3,
        field2: String::new(),
    });

    #[test]
    fn test_impl_default() {
        let c = TestConfig::default();

        assert_eq!(c.field1, 3);
        assert_eq!(c.field2, "");
    }

    #[test]
    fn test_clamp_finite() {
        assert_eq!(clamp_finite!(1.5, 0.0, 1.0), 1.0);
        assert_eq!(clamp_finite!(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clamp_finite!(f32::NAN, 0.0, 1.0), 0.0);
        assert_eq!(clamp_finite!(0.25, 0.0, 1.0), 0.25);
    }
}
