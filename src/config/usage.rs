//! 配置文件格式说明

/// 返回配置文件格式的说明文本，供 `usage` 子命令输出
pub fn usage() -> &'static str {
    r#"
## 配置文件

worker-boot 读取一个 YAML 文件（扩展名为 .toml 时按 TOML 解析），字段如下：

    provider: （必填）负责该 worker 的 provider 信息

        providerType: （必填）provider 类型，通常表示 worker 所在的云平台，
            非云环境使用 'static'。

        workerPoolId: （可选）worker pool 标识；设置后密钥名称为
            'worker-pool:<workerPoolId>'。

        其余字段由 provider 自行解释，原样传给 worker。

    worker: （必填）要运行的 worker 信息

        implementation: （必填）worker 实现的名称。

        其余字段由 worker 实现自行解释，原样传给 worker。

    workerConfig: 任意嵌套数据，作为传给 worker 的配置基础；
        会与密钥服务返回的配置深度合并，冲突时密钥优先。
        数值必须是有限数，inf 和 nan 无法写入缓存，加载时即报错。

    getSecrets: 为 true（默认）时从密钥服务获取配置并合并到 workerConfig。
        一般只在测试时关闭。

    cacheOverRestarts: 设置为文件路径时，首次成功解析后的完整配置会写入该
        JSON 文件。之后启动时如果文件存在，直接使用其中的配置启动 worker，
        不再访问密钥服务或其他外部资源。适用于运行过程中会重启系统、
        并期望重启后沿用相同配置的 worker 实现。文件存在但无法解析时启动失败。

使用 --env-substitution 时，字符串值中的 ${VAR} 会替换为同名环境变量的值（映射的键不替换）；
默认不替换，${...} 原样交给 worker。
"#
}
